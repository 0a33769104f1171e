use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fv::{
    Ciphertext, Digits, Encryptor, Evaluator, KeyGenerator, Parameters, ParametersLiteral,
    RotationKeys, SecretKey,
};

fn keyswitch(c: &mut Criterion) {
    let mut b: criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> =
        c.benchmark_group("keyswitch");

    for window_size in [8, 20] {
        let params: Parameters =
            Parameters::new(&ParametersLiteral::default().with_window_size(window_size)).unwrap();
        let mut kgen: KeyGenerator = KeyGenerator::with_seed([0u8; 32]);
        let sk: SecretKey = kgen.gen_secret_key(&params);
        let keys: RotationKeys = kgen.gen_rotation_keys(&params, &sk, &[1]).unwrap();
        let values: Vec<u64> = (0..params.n() as u64).collect();
        let ct: Ciphertext =
            Encryptor::with_seed([1u8; 32]).encrypt_sk(&params, &sk, &params.encode(&values));
        let eval: Evaluator = Evaluator::with_keys(&params, &keys);
        let digits: Digits = eval.hoisted_decompose(&ct);

        let label: String = format!("ws={}/n={}", window_size, params.n());
        b.bench_with_input(BenchmarkId::new("decompose", &label), &(), |b, _| {
            b.iter(|| eval.hoisted_decompose(&ct))
        });
        b.bench_with_input(BenchmarkId::new("automorphism", &label), &(), |b, _| {
            b.iter(|| eval.automorphism(1, &ct).unwrap())
        });
        b.bench_with_input(BenchmarkId::new("automorphism/hoisted", &label), &(), |b, _| {
            b.iter(|| eval.automorphism_digits(1, &ct, &digits).unwrap())
        });
    }
}

criterion_group!(benches, keyswitch);
criterion_main!(benches);
