//! Number-theoretic helpers used once, at parameter setup.

use std::collections::BTreeSet;

use num_integer::Integer;
use sampling::Source;
use tracing::trace;

use crate::error::MathError;
use crate::modulus::{WordOps, mod_exp, mod_mul};

/// Witness set that makes Miller-Rabin deterministic over all `u64`.
const DETERMINISTIC_WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

pub const DEFAULT_MILLER_RABIN_ROUNDS: usize = 100;

#[inline(always)]
pub fn gcd(a: u64, b: u64) -> u64 {
    a.gcd(&b)
}

/// Returns true if `a` proves the odd integer `n > 2` composite.
fn is_witness(a: u64, n: u64) -> bool {
    let s: u32 = (n - 1).trailing_zeros();
    let d: u64 = (n - 1) >> s;
    let mut x: u64 = mod_exp(a, d, n);
    if x == 1 || x == n - 1 {
        return false;
    }
    for _ in 1..s {
        x = mod_mul(x, x, n);
        if x == n - 1 {
            return false;
        }
    }
    true
}

/// Miller-Rabin test of `n` against the given witnesses.
pub fn miller_rabin<I: IntoIterator<Item = u64>>(n: u64, witnesses: I) -> bool {
    if n < 4 {
        return n == 2 || n == 3;
    }
    if n & 1 == 0 {
        return false;
    }
    witnesses
        .into_iter()
        .map(|a| a % n)
        .filter(|&a| a > 1 && a < n - 1)
        .all(|a| !is_witness(a, n))
}

/// Deterministic primality test for any `u64`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in DETERMINISTIC_WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    miller_rabin(n, DETERMINISTIC_WITNESSES)
}

/// Miller-Rabin with `rounds` witnesses drawn from `source`.
pub fn is_probable_prime(n: u64, rounds: usize, source: &mut Source) -> bool {
    if n < 4 {
        return n == 2 || n == 3;
    }
    if n & 1 == 0 {
        return false;
    }
    let range: u64 = n - 3;
    let mask: u64 = range.mask();
    (0..rounds).all(|_| !is_witness(2 + source.next_u64n(range, mask), n))
}

/// Finds a non-trivial factor of the composite `n` with Pollard's rho.
pub fn pollard_rho(n: u64, source: &mut Source) -> u64 {
    debug_assert!(n > 3 && !is_prime(n), "invalid argument n={}: must be composite", n);
    if n & 1 == 0 {
        return 2;
    }
    let mask: u64 = n.mask();
    loop {
        let c: u64 = 1 + source.next_u64n(n - 1, mask);
        let step = |x: u64| ((mod_mul(x, x, n) as u128 + c as u128) % n as u128) as u64;
        let mut x: u64 = source.next_u64n(n, mask);
        let mut y: u64 = x;
        let mut d: u64 = 1;
        while d == 1 {
            x = step(x);
            y = step(step(y));
            d = gcd(x.abs_diff(y), n);
        }
        if d != n {
            trace!(n, factor = d, "pollard rho");
            return d;
        }
    }
}

/// Distinct prime factors of `n`.
pub fn prime_factors(n: u64, source: &mut Source) -> BTreeSet<u64> {
    let mut factors: BTreeSet<u64> = BTreeSet::new();
    let mut rest: u64 = n;
    for p in DETERMINISTIC_WITNESSES {
        if rest % p == 0 {
            factors.insert(p);
            while rest % p == 0 {
                rest /= p;
            }
        }
    }
    let mut stack: Vec<u64> = vec![rest];
    while let Some(m) = stack.pop() {
        if m == 1 {
            continue;
        }
        if is_prime(m) {
            factors.insert(m);
            continue;
        }
        let d: u64 = pollard_rho(m, source);
        stack.push(d);
        stack.push(m / d);
    }
    factors
}

/// Euler's totient.
pub fn totient(n: u64, source: &mut Source) -> u64 {
    prime_factors(n, source)
        .into_iter()
        .fold(n, |acc, p| acc / p * (p - 1))
}

/// Checks that `g` generates the multiplicative group of the prime `q`.
pub fn is_generator(g: u64, q: u64, source: &mut Source) -> bool {
    if g % q == 0 {
        return false;
    }
    prime_factors(q - 1, source)
        .into_iter()
        .all(|f| mod_exp(g, (q - 1) / f, q) != 1)
}

/// Random generator of the multiplicative group of the prime `q`.
pub fn find_generator(q: u64, source: &mut Source) -> u64 {
    if q == 2 {
        return 1;
    }
    let factors: BTreeSet<u64> = prime_factors(q - 1, source);
    let mask: u64 = (q - 1).mask();
    loop {
        let g: u64 = 1 + source.next_u64n(q - 1, mask);
        if factors.iter().all(|f| mod_exp(g, (q - 1) / f, q) != 1) {
            return g;
        }
    }
}

/// Primitive `m`-th root of unity modulo the prime `q`.
pub fn root_of_unity(m: u64, q: u64, source: &mut Source) -> Result<u64, MathError> {
    if m == 0 || (q - 1) % m != 0 {
        return Err(MathError::Congruence { modulus: q, order: m });
    }
    if m == 1 {
        return Ok(1);
    }
    loop {
        let root: u64 = mod_exp(find_generator(q, source), (q - 1) / m, q);
        if root != 1 {
            return Ok(root);
        }
    }
}

/// Checks that `psi` has multiplicative order exactly `m` modulo `q`.
pub fn is_primitive_root_of_unity(psi: u64, m: u64, q: u64) -> bool {
    if m == 0 || mod_exp(psi, m, q) != 1 {
        return false;
    }
    let mut rest: u64 = m;
    let mut f: u64 = 2;
    while f * f <= rest {
        if rest % f == 0 {
            if mod_exp(psi, m / f, q) == 1 {
                return false;
            }
            while rest % f == 0 {
                rest /= f;
            }
        }
        f += 1;
    }
    rest == 1 || mod_exp(psi, m / rest, q) != 1
}

/// Smallest prime `q = 1 mod m` above `2^bits`.
pub fn first_prime(bits: u32, m: u64) -> Option<u64> {
    let base: u64 = 1u64.checked_shl(bits)?;
    let start: u64 = base.checked_add(m - base % m)?.checked_add(1)?;
    primes_congruent_one_from(start, m)
}

/// Smallest prime `q' = 1 mod m` with `q' > q`.
pub fn next_prime(q: u64, m: u64) -> Option<u64> {
    let start: u64 = q.checked_add(m - q % m)?.checked_add(1)?;
    primes_congruent_one_from(start, m)
}

fn primes_congruent_one_from(mut candidate: u64, m: u64) -> Option<u64> {
    while !is_prime(candidate) {
        candidate = candidate.checked_add(m)?;
    }
    Some(candidate)
}
