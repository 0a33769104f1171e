//! Reductions specialised to the two fixed primes.
//!
//! `Q = 2^60 - 106909695` folds high bits back with the small complement,
//! `P = 557057` uses a 42-bit Barrett constant. "Partial" functions return a
//! congruent value that may exceed the modulus, "full" ones return `[0, m)`.

/// Ciphertext prime, `Q = 1 mod 4096`.
pub const Q: u64 = 1152921504499937281;
/// Primitive 4096-th root of unity modulo `Q`.
pub const PSI_Q: u64 = 246029739010950493;
/// Plaintext prime, `P = 1 mod 4096`.
pub const P: u64 = 557057;
/// Primitive 4096-th root of unity modulo `P`.
pub const PSI_P: u64 = 201127;
/// Ring degree exponent of the fixed parameter set.
pub const LOG_N: usize = 11;

const Q_COMPLEMENT: u64 = (1 << 60) - Q;
const LOW60: u64 = (1 << 60) - 1;
const LOW61: u64 = (1 << 61) - 1;

const P_SHIFT: u32 = 42;
const P_MU: u64 = (1 << P_SHIFT) / P;
/// Inputs of [`modp_part`] must stay below this bound.
pub const MODP_PART_LIMIT: u64 = 1 << 41;

/// Congruent to `a` mod Q, below `2^60 + 15·(2^60 - Q)`.
#[inline(always)]
pub fn modq_part(a: u64) -> u64 {
    (a >> 60) * Q_COMPLEMENT + (a & LOW60)
}

/// Congruent to `a` mod Q, below `2^61 + 2^58` for `a < 2^123` and below
/// `2^64` for any `a`.
#[inline(always)]
pub fn modq_part_u128(a: u128) -> u64 {
    let hi: u128 = a >> 64;
    let lo: u128 = a & u64::MAX as u128;
    // 2^64 = 16 * 2^60 = 16 * (2^60 - Q) mod Q
    let b: u128 = lo + hi * ((Q_COMPLEMENT as u128) << 4);
    // 2^61 = 2 * (2^60 - Q) mod Q
    ((b >> 61) * ((Q_COMPLEMENT as u128) << 1) + (b & LOW61 as u128)) as u64
}

#[inline(always)]
pub fn modq_full(a: u64) -> u64 {
    let mut r: u64 = modq_part(a);
    while r >= Q {
        r -= Q;
    }
    r
}

#[inline(always)]
pub fn mul_modq_part(a: u64, b: u64) -> u64 {
    modq_part_u128(a as u128 * b as u128)
}

/// `a - b` for `a, b < 4Q`, partially reduced.
#[inline(always)]
pub fn sub_modq_part(a: u64, b: u64) -> u64 {
    debug_assert!(b <= Q << 2);
    modq_part(a + (Q << 2) - b)
}

/// `a * 2^shift`, partially reduced.
#[inline(always)]
pub fn lshift_modq_part(a: u64, shift: u32) -> u64 {
    debug_assert!(shift < 64);
    modq_part_u128((a as u128) << shift)
}

/// Congruent to `a` mod P, in `[0, 2P)`, for `a < 2^41`.
#[inline(always)]
pub fn modp_part(a: u64) -> u64 {
    debug_assert!(a < MODP_PART_LIMIT, "modp_part input {} >= 2^41", a);
    a - ((a * P_MU) >> P_SHIFT) * P
}

/// [`modp_part`] extended to the whole `u64` range.
#[inline(always)]
pub fn modp_reduce_lazy(a: u64) -> u64 {
    if a < MODP_PART_LIMIT { modp_part(a) } else { a % P }
}

/// `a mod P` for `a < 2P`.
#[inline(always)]
pub fn modp_full(a: u64) -> u64 {
    debug_assert!(a < P << 1);
    if a >= P { a - P } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::mod_exp;

    #[test]
    fn constants() {
        assert_eq!(Q_COMPLEMENT, 106909695);
        assert_eq!((Q - 1) % 4096, 0);
        assert_eq!((P - 1) % 4096, 0);
        assert_eq!(mod_exp(PSI_Q, 2048, Q), Q - 1);
        assert_eq!(mod_exp(PSI_P, 2048, P), P - 1);
    }

    #[test]
    fn q_partial_reductions() {
        let cases: [u64; 6] = [0, 1, Q - 1, Q, Q << 2, u64::MAX];
        for a in cases {
            assert_eq!(modq_full(a), a % Q);
            assert_eq!(modq_part(a) % Q, a % Q);
            for b in [0u64, 1, Q - 1, Q << 1] {
                let expected: u128 = (a as u128 * b as u128) % Q as u128;
                assert_eq!(mul_modq_part(a, b) as u128 % Q as u128, expected);
                if a < Q << 2 {
                    assert_eq!(
                        sub_modq_part(a, b) % Q,
                        ((a % Q) + Q - (b % Q)) % Q
                    );
                }
            }
            assert_eq!(
                lshift_modq_part(a, 20) as u128 % Q as u128,
                ((a as u128) << 20) % Q as u128
            );
        }
        assert!(modq_part_u128(u128::MAX) as u128 % (Q as u128) == u128::MAX % Q as u128);
    }

    #[test]
    fn p_partial_reductions() {
        for a in [0u64, 1, P - 1, P, 2 * P - 1, (P - 1) * (P - 1), MODP_PART_LIMIT - 1] {
            let r: u64 = modp_part(a);
            assert!(r < 2 * P);
            assert_eq!(modp_full(r), a % P);
        }
        assert_eq!(modp_reduce_lazy(u64::MAX) % P, u64::MAX % P);
    }
}
