pub mod barrett;
pub mod fast;

use crate::error::MathError;
use barrett::BarrettPrecomp;

pub trait WordOps<O> {
    /// Ceiling of the base-2 logarithm.
    fn log2(self) -> O;
    fn reverse_bits_msb(self, n: u32) -> O;
    /// All-ones mask covering `self - 1`.
    fn mask(self) -> O;
}

impl WordOps<u64> for u64 {
    #[inline(always)]
    fn log2(self) -> u64 {
        (u64::BITS - (self - 1).leading_zeros()) as _
    }
    #[inline(always)]
    fn reverse_bits_msb(self, n: u32) -> u64 {
        self.reverse_bits() >> (u64::BITS - n)
    }
    #[inline(always)]
    fn mask(self) -> u64 {
        let log2: u64 = self.log2();
        if log2 == 64 { u64::MAX } else { (1 << log2) - 1 }
    }
}

impl WordOps<usize> for usize {
    #[inline(always)]
    fn log2(self) -> usize {
        (usize::BITS - (self - 1).leading_zeros()) as _
    }
    #[inline(always)]
    fn reverse_bits_msb(self, n: u32) -> usize {
        if n == 0 {
            return 0;
        }
        self.reverse_bits() >> (usize::BITS - n)
    }
    #[inline(always)]
    fn mask(self) -> usize {
        (1 << self.log2()) - 1
    }
}

pub trait ReduceOnce<O> {
    /// Assigns self-q to self if self >= q.
    /// User must ensure that 2q fits in O.
    fn reduce_once_assign(&mut self, q: O);
    /// Returns self-q if self >= q else self.
    /// User must ensure that 2q fits in O.
    fn reduce_once(&self, q: O) -> O;
}

impl ReduceOnce<u64> for u64 {
    #[inline(always)]
    fn reduce_once_assign(&mut self, q: u64) {
        debug_assert!(q < 0x8000000000000000, "2q >= 2^64");
        *self = (*self).min(self.wrapping_sub(q))
    }

    #[inline(always)]
    fn reduce_once(&self, q: u64) -> u64 {
        debug_assert!(q < 0x8000000000000000, "2q >= 2^64");
        (*self).min(self.wrapping_sub(q))
    }
}

/// `a * b mod q` through a 128-bit product, for any `q`.
#[inline(always)]
pub fn mod_mul(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

/// `a^e mod q` by square-and-multiply, for any `q`.
pub fn mod_exp(a: u64, mut e: u64, q: u64) -> u64 {
    let mut base: u64 = a % q;
    let mut acc: u64 = 1 % q;
    while e != 0 {
        if e & 1 == 1 {
            acc = mod_mul(acc, base, q);
        }
        base = mod_mul(base, base, q);
        e >>= 1;
    }
    acc
}

/// Inverse of `a` modulo a prime `q`.
pub fn mod_inv(a: u64, q: u64) -> u64 {
    mod_exp(a, q - 2, q)
}

/// Reduction strategy of a ring modulus.
///
/// `Generic` handles any odd modulus below 2^62 with Barrett reduction and
/// always returns fully reduced values. `FastQ` and `FastP` exploit the
/// shape of the two fixed primes and return lazily reduced values below
/// [`Modulus::lazy_bound`]-compatible ranges; [`Modulus::finalize`] brings
/// any such value into `[0, q)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modulus {
    Generic(BarrettPrecomp),
    FastQ,
    FastP,
}

impl Modulus {
    /// Selects the fast path when `fast` is set, which is only available for
    /// the two fixed primes.
    pub fn new(q: u64, fast: bool) -> Result<Self, MathError> {
        if fast { Self::fast(q) } else { Self::generic(q) }
    }

    pub fn generic(q: u64) -> Result<Self, MathError> {
        if q < 3 || q & 1 == 0 || q >= 1 << 62 {
            return Err(MathError::InvalidModulus(q));
        }
        Ok(Self::Generic(BarrettPrecomp::new(q)))
    }

    pub fn fast(q: u64) -> Result<Self, MathError> {
        match q {
            fast::Q => Ok(Self::FastQ),
            fast::P => Ok(Self::FastP),
            _ => Err(MathError::NoFastPath(q)),
        }
    }

    #[inline(always)]
    pub fn q(&self) -> u64 {
        match self {
            Self::Generic(b) => b.q,
            Self::FastQ => fast::Q,
            Self::FastP => fast::P,
        }
    }

    pub fn is_fast(&self) -> bool {
        !matches!(self, Self::Generic(_))
    }

    /// Multiple of q that dominates every lazy product, used to keep
    /// subtractions non-negative without a full reduction.
    #[inline(always)]
    pub fn lazy_bound(&self) -> u64 {
        match self {
            Self::Generic(b) => b.q,
            Self::FastQ => fast::Q << 2,
            Self::FastP => fast::P << 1,
        }
    }

    #[inline(always)]
    pub fn reduce_lazy(&self, x: u64) -> u64 {
        match self {
            Self::Generic(b) => b.reduce(x),
            Self::FastQ => fast::modq_part(x),
            Self::FastP => fast::modp_reduce_lazy(x),
        }
    }

    #[inline(always)]
    pub fn reduce_u128_lazy(&self, x: u128) -> u64 {
        match self {
            Self::Generic(b) => b.reduce_u128(x),
            Self::FastQ => fast::modq_part_u128(x),
            Self::FastP => (x % fast::P as u128) as u64,
        }
    }

    /// Fully reduces any `u64`, in particular the output of a lazy operation.
    #[inline(always)]
    pub fn finalize(&self, x: u64) -> u64 {
        match self {
            Self::Generic(b) => b.reduce(x),
            Self::FastQ => fast::modq_full(x),
            Self::FastP => fast::modp_full(fast::modp_reduce_lazy(x)),
        }
    }

    #[inline(always)]
    pub fn reduce(&self, x: u64) -> u64 {
        self.finalize(x)
    }

    #[inline(always)]
    pub fn reduce_u128(&self, x: u128) -> u64 {
        self.finalize(self.reduce_u128_lazy(x))
    }

    #[inline(always)]
    pub fn mul_lazy(&self, a: u64, b: u64) -> u64 {
        match self {
            Self::Generic(p) => p.reduce_u128(a as u128 * b as u128),
            Self::FastQ => fast::mul_modq_part(a, b),
            Self::FastP => {
                let x: u128 = a as u128 * b as u128;
                if x < fast::MODP_PART_LIMIT as u128 {
                    fast::modp_part(x as u64)
                } else {
                    (x % fast::P as u128) as u64
                }
            }
        }
    }

    #[inline(always)]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.finalize(self.mul_lazy(a, b))
    }

    /// `a + b mod q` for reduced inputs.
    #[inline(always)]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.q() && b < self.q());
        (a + b).reduce_once(self.q())
    }

    /// `a - b mod q` for reduced inputs.
    #[inline(always)]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.q() && b < self.q());
        (a + self.q() - b).reduce_once(self.q())
    }

    #[inline(always)]
    pub fn neg(&self, a: u64) -> u64 {
        debug_assert!(a < self.q());
        if a == 0 { 0 } else { self.q() - a }
    }

    pub fn pow(&self, a: u64, mut e: u64) -> u64 {
        let mut base: u64 = self.reduce(a);
        let mut acc: u64 = 1;
        while e != 0 {
            if e & 1 == 1 {
                acc = self.mul(acc, base);
            }
            base = self.mul(base, base);
            e >>= 1;
        }
        acc
    }

    /// Inverse of `a`; q must be prime.
    pub fn inv(&self, a: u64) -> u64 {
        self.pow(a, self.q() - 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampling::Source;

    #[test]
    fn word_ops() {
        assert_eq!(2048u64.log2(), 11);
        assert_eq!(2049u64.log2(), 12);
        assert_eq!(2048u64.mask(), 2047);
        assert_eq!(1usize.reverse_bits_msb(11), 1024);
        assert_eq!(6usize.reverse_bits_msb(3), 3);
    }

    #[test]
    fn modular_helpers() {
        let q: u64 = 557057;
        assert_eq!(mod_exp(3, 0, q), 1);
        assert_eq!(mod_mul(q - 1, q - 1, q), 1);
        let x: u64 = 123456;
        assert_eq!(mod_mul(x, mod_inv(x, q), q), 1);
    }

    #[test]
    fn fast_flag_selection() {
        assert_eq!(Modulus::new(fast::Q, true), Ok(Modulus::FastQ));
        assert_eq!(Modulus::new(fast::P, true), Ok(Modulus::FastP));
        assert_eq!(Modulus::new(97, true), Err(MathError::NoFastPath(97)));
        assert_eq!(Modulus::generic(96), Err(MathError::InvalidModulus(96)));
        assert!(!Modulus::new(fast::P, false).unwrap().is_fast());
    }

    #[test]
    fn fast_and_generic_agree() {
        let mut source: Source = Source::new([0u8; 32]);
        for q in [fast::Q, fast::P] {
            let fast: Modulus = Modulus::fast(q).unwrap();
            let generic: Modulus = Modulus::generic(q).unwrap();
            (0..4096).for_each(|_| {
                let a: u64 = source.next_u64n(q, q.mask());
                let b: u64 = source.next_u64n(q, q.mask());
                let x: u64 = source.next_u64n(u64::MAX, u64::MAX);
                let wide: u128 = (x as u128) << 60 | a as u128;
                assert_eq!(fast.mul(a, b), generic.mul(a, b));
                assert_eq!(fast.mul(a, b), mod_mul(a, b, q));
                assert_eq!(fast.reduce(x), x % q);
                assert_eq!(generic.reduce(x), x % q);
                assert_eq!(fast.reduce_u128(wide), (wide % q as u128) as u64);
                assert_eq!(generic.reduce_u128(wide), (wide % q as u128) as u64);
                assert_eq!(fast.add(a, b), (a + b) % q);
                assert_eq!(fast.sub(a, b), (a + q - b) % q);
                assert_eq!(fast.add(fast.neg(a), a), 0);
            });
            assert_eq!(fast.mul(fast.inv(12345), 12345), 1);
            assert_eq!(generic.pow(3, q - 1), 1);
        }
    }

    #[test]
    fn lazy_values_stay_below_bound() {
        let mut source: Source = Source::new([1u8; 32]);
        for modulus in [Modulus::FastQ, Modulus::FastP] {
            let q: u64 = modulus.q();
            let bound: u64 = modulus.lazy_bound();
            (0..4096).for_each(|_| {
                let omega: u64 = source.next_u64n(q, q.mask());
                let x: u64 = source.next_u64n(2 * bound, (2 * bound).mask());
                let w: u64 = modulus.mul_lazy(omega, x);
                assert!(w <= bound);
                assert_eq!(modulus.finalize(w), mod_mul(omega, x % q, q));
                let e: u64 = modulus.reduce_lazy(x);
                assert!(e < bound);
                assert_eq!(modulus.finalize(e), x % q);
            });
        }
    }
}
