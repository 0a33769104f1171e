use std::fmt;
use std::marker::PhantomData;

/// Coefficient representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coeff;

/// Evaluation (NTT) representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eval;

/// Ring element of `Z_q[X]/(X^n + 1)` tagged with its representation.
///
/// Pointwise products only exist on `Poly<Eval>`; the only way between the
/// two forms is [`crate::ring::Ring::to_eval`] and
/// [`crate::ring::Ring::to_coeff`].
pub struct Poly<R>(pub Vec<u64>, PhantomData<R>);

// Derived impls would bound `R`.
impl<R> Clone for Poly<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<R> PartialEq for Poly<R> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<R> Eq for Poly<R> {}

impl<R> fmt::Debug for Poly<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Poly").field(&self.0).finish()
    }
}

impl<R> Poly<R> {
    pub fn new(n: usize) -> Self {
        Self(vec![0u64; n], PhantomData)
    }

    pub fn from_vec(data: Vec<u64>) -> Self {
        Self(data, PhantomData)
    }

    pub fn n(&self) -> usize {
        self.0.len()
    }

    pub fn log_n(&self) -> usize {
        self.n().trailing_zeros() as usize
    }

    #[inline(always)]
    pub fn at(&self, i: usize) -> u64 {
        self.0[i]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.0
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }

    pub fn zero(&mut self) {
        self.0.fill(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&x| x == 0)
    }

    pub fn copy_from(&mut self, other: &Poly<R>) {
        assert!(
            self.n() == other.n(),
            "invalid argument other: other.n()={} != self.n()={}",
            other.n(),
            self.n()
        );
        self.0.copy_from_slice(&other.0)
    }
}

impl Poly<Coeff> {
    /// Splits every coefficient into `num_windows` digits of `log_base` bits,
    /// least significant first. Coefficients must be fully reduced.
    pub fn decompose(&self, log_base: usize, num_windows: usize) -> Vec<Poly<Coeff>> {
        assert!(
            (1..64).contains(&log_base),
            "invalid argument log_base={}: must be in [1, 63]",
            log_base
        );
        let mask: u64 = (1 << log_base) - 1;
        (0..num_windows)
            .map(|w| {
                let shift: usize = w * log_base;
                Poly::from_vec(
                    self.0
                        .iter()
                        .map(|&x| if shift >= 64 { 0 } else { (x >> shift) & mask })
                        .collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposition_recomposes() {
        let a: Poly<Coeff> = Poly::from_vec(vec![0, 1, 255, 256, 1152921504499937280, 557056]);
        let log_base: usize = 8;
        let num_windows: usize = 8;
        let digits: Vec<Poly<Coeff>> = a.decompose(log_base, num_windows);
        assert_eq!(digits.len(), num_windows);
        (0..a.n()).for_each(|i| {
            let value: u64 = digits
                .iter()
                .enumerate()
                .map(|(w, d)| {
                    assert!(d.at(i) < 1 << log_base);
                    d.at(i) << (w * log_base)
                })
                .sum();
            assert_eq!(value, a.at(i));
        });
    }

    fn duplicate<R>(a: &Poly<R>) -> Poly<R> {
        a.clone()
    }

    /// Unconstrained markers still clone, compare and print.
    #[test]
    fn generic_clone() {
        struct Marker;
        let a: Poly<Marker> = Poly::from_vec(vec![1, 2, 3]);
        let b: Poly<Marker> = duplicate(&a);
        assert_eq!(a, b);
        assert_eq!(format!("{:?}", b), "Poly([1, 2, 3])");
        assert_eq!(duplicate(&Poly::<Eval>::new(4)).n(), 4);
    }

    #[test]
    fn windows_past_word_are_zero() {
        let a: Poly<Coeff> = Poly::from_vec(vec![u64::MAX; 4]);
        let digits: Vec<Poly<Coeff>> = a.decompose(20, 5);
        assert_eq!(digits[2].at(0), (1 << 20) - 1);
        assert_eq!(digits[3].at(0), 15);
        assert!(digits[4].is_zero());
    }
}
