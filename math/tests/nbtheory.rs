use math::modulus::fast::{P, Q};
use math::nbtheory::{is_prime, prime_factors, totient};
use prime_factorization::Factorization;
use sampling::Source;

#[test]
fn primality_matches_reference() {
    for n in (0..5000u64).chain((1u64 << 40)..(1u64 << 40) + 2000).chain([P, Q]) {
        assert_eq!(is_prime(n), primality_test::is_prime(n), "n={}", n);
    }
}

#[test]
fn factorization_matches_reference() {
    let mut source: Source = Source::new([0u8; 32]);
    for n in [Q - 1, P - 1, 600851475143u64, 3 * 5 * 7 * 11 * 13 * 1009, 1 << 40] {
        let mut expected: Vec<u64> = Factorization::run(n)
            .prime_factor_repr()
            .iter()
            .map(|f| f.0)
            .collect();
        expected.dedup();
        let have: Vec<u64> = prime_factors(n, &mut source).into_iter().collect();
        assert_eq!(have, expected, "n={}", n);
    }
    assert_eq!(totient(Q, &mut source), Q - 1);
}
