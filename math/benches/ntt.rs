use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use math::dft::ntt::Table;
use math::modulus::Modulus;
use math::modulus::fast::{LOG_N, P, PSI_P, PSI_Q, Q};

fn ntt(c: &mut Criterion) {
    fn runner<'a, const FORWARD: bool, const LAZY: bool>(
        table: &'a Table,
    ) -> Box<dyn FnMut() + 'a> {
        let mut a: Vec<u64> = (0..table.n() as u64).collect();
        if FORWARD {
            Box::new(move || table.forward_inplace::<LAZY>(&mut a))
        } else {
            Box::new(move || table.backward_inplace::<LAZY>(&mut a))
        }
    }

    let mut b: criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> =
        c.benchmark_group("ntt");

    for (name, q, psi) in [("q", Q, PSI_Q), ("p", P, PSI_P)] {
        for fast in [true, false] {
            let Ok(modulus) = Modulus::new(q, fast) else {
                continue;
            };
            let Ok(table) = Table::new(modulus, psi, LOG_N) else {
                continue;
            };

            let runners: [(String, Box<dyn FnMut()>); 3] = [
                (format!("forward/lazy/fast={}", fast), runner::<true, true>(&table)),
                (format!("forward/fast={}", fast), runner::<true, false>(&table)),
                (format!("backward/fast={}", fast), runner::<false, false>(&table)),
            ];

            for (label, mut runner) in runners {
                let id: BenchmarkId = BenchmarkId::new(label, format!("{}/n={}", name, table.n()));
                b.bench_with_input(id, &(), |b: &mut criterion::Bencher<'_>, _| {
                    b.iter(&mut runner)
                });
            }
        }
    }
}

criterion_group!(benches, ntt);
criterion_main!(benches);
