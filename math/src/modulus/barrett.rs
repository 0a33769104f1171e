use num_bigint::BigUint;
use num_traits::One;

use crate::modulus::ReduceOnce;

const LO_MASK: u128 = u64::MAX as u128;

/// Barrett constant `floor(2^128 / q)` split into two words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrettPrecomp {
    pub q: u64,
    pub lo: u64,
    pub hi: u64,
}

impl BarrettPrecomp {
    pub fn new(q: u64) -> BarrettPrecomp {
        debug_assert!(q > 2 && q < 1 << 62, "invalid modulus q={}", q);
        let big_r: BigUint = (BigUint::one() << 128usize) / BigUint::from(q);
        let digits: Vec<u64> = big_r.to_u64_digits();
        Self {
            q,
            lo: digits.first().copied().unwrap_or(0),
            hi: digits.get(1).copied().unwrap_or(0),
        }
    }

    #[inline(always)]
    pub fn value_hi(&self) -> &u64 {
        &self.hi
    }

    #[inline(always)]
    pub fn value_lo(&self) -> &u64 {
        &self.lo
    }

    /// Returns `x mod q` in `[0, q)`.
    #[inline(always)]
    pub fn reduce(&self, x: u64) -> u64 {
        self.reduce_lazy(x).reduce_once(self.q)
    }

    /// Returns a value in `[0, 2q)` congruent to `x`.
    #[inline(always)]
    pub fn reduce_lazy(&self, x: u64) -> u64 {
        let mhi: u64 = ((x as u128 * self.hi as u128) >> 64) as u64;
        x.wrapping_sub(mhi.wrapping_mul(self.q))
    }

    /// Returns `x mod q` in `[0, q)`.
    #[inline(always)]
    pub fn reduce_u128(&self, x: u128) -> u64 {
        self.reduce_u128_lazy(x).reduce_once(self.q)
    }

    /// Returns a value in `[0, 2q)` congruent to `x`.
    ///
    /// The quotient `floor(x * floor(2^128/q) / 2^128)` is assembled exactly
    /// from four partial products, so it undershoots `floor(x/q)` by at most one.
    #[inline(always)]
    pub fn reduce_u128_lazy(&self, x: u128) -> u64 {
        let (x_hi, x_lo) = ((x >> 64) as u64, x as u64);
        let ll: u128 = (x_lo as u128 * self.lo as u128) >> 64;
        let lh: u128 = x_lo as u128 * self.hi as u128;
        let hl: u128 = x_hi as u128 * self.lo as u128;
        let carry: u128 = ((lh & LO_MASK) + (hl & LO_MASK) + ll) >> 64;
        let quotient: u128 = x_hi as u128 * self.hi as u128 + (lh >> 64) + (hl >> 64) + carry;
        x_lo.wrapping_sub((quotient as u64).wrapping_mul(self.q))
    }
}

#[cfg(test)]
mod tests {
    use super::BarrettPrecomp;

    #[test]
    fn precomp_constant() {
        let q: u64 = 0x1fffffffffe00001;
        let b: BarrettPrecomp = BarrettPrecomp::new(q);
        let r: u128 = ((b.hi as u128) << 64) | b.lo as u128;
        assert_eq!(r, u128::MAX / q as u128);
    }

    #[test]
    fn reduces_extremes() {
        for q in [3u64, 97, 557057, 1152921504499937281, (1 << 62) - 57] {
            let b: BarrettPrecomp = BarrettPrecomp::new(q);
            for x in [0u64, 1, q - 1, q, q + 1, u64::MAX] {
                assert_eq!(b.reduce(x), x % q, "q={} x={}", q, x);
            }
            for x in [0u128, q as u128 * q as u128, u128::MAX, u128::MAX >> 3] {
                assert_eq!(b.reduce_u128(x), (x % q as u128) as u64, "q={} x={}", q, x);
            }
        }
    }
}
