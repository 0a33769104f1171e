use itertools::izip;

use crate::dft::DFT;
use crate::error::MathError;
use crate::modulus::{Modulus, WordOps};

/// Largest supported ring degree exponent.
pub const MAX_LOG_N: usize = 17;

/// Precomputed tables of the negacyclic NTT of degree `n = 2^log_n`.
///
/// The forward transform maps coefficients `a_i` to the evaluations
/// `A_j = a(psi^(2j+1))`, in natural order of `j`.
#[derive(Clone, Debug)]
pub struct Table {
    modulus: Modulus,
    log_n: usize,
    psi: u64,
    psi_powers: Vec<u64>,
    psi_inv_powers: Vec<u64>,
    scaled_psi_inv_powers: Vec<u64>,
    bit_rev: Vec<usize>,
}

impl Table {
    /// Builds the tables for the primitive `2n`-th root of unity `psi`.
    pub fn new(modulus: Modulus, psi: u64, log_n: usize) -> Result<Table, MathError> {
        if log_n == 0 || log_n > MAX_LOG_N {
            return Err(MathError::InvalidLogN(log_n));
        }
        let n: usize = 1 << log_n;
        let q: u64 = modulus.q();
        let two_n: u64 = (n as u64) << 1;

        if (q - 1) % two_n != 0 {
            return Err(MathError::Congruence {
                modulus: q,
                order: two_n,
            });
        }
        if psi >= q || modulus.pow(psi, n as u64) != q - 1 {
            return Err(MathError::NotPrimitiveRoot {
                psi,
                order: two_n,
                modulus: q,
            });
        }

        let psi_inv: u64 = modulus.inv(psi);
        let n_inv: u64 = modulus.inv(n as u64);

        let powers = |root: u64| -> Vec<u64> {
            std::iter::successors(Some(1u64), |&x| Some(modulus.mul(x, root)))
                .take(n)
                .collect()
        };

        let psi_powers: Vec<u64> = powers(psi);
        let psi_inv_powers: Vec<u64> = powers(psi_inv);
        let scaled_psi_inv_powers: Vec<u64> = psi_inv_powers
            .iter()
            .map(|&x| modulus.mul(x, n_inv))
            .collect();
        let bit_rev: Vec<usize> = (0..n).map(|i| i.reverse_bits_msb(log_n as u32)).collect();

        Ok(Self {
            modulus,
            log_n,
            psi,
            psi_powers,
            psi_inv_powers,
            scaled_psi_inv_powers,
            bit_rev,
        })
    }

    pub fn n(&self) -> usize {
        1 << self.log_n
    }

    pub fn log_n(&self) -> usize {
        self.log_n
    }

    pub fn psi(&self) -> u64 {
        self.psi
    }

    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    pub fn forward_inplace<const LAZY: bool>(&self, a: &mut [u64]) {
        self.check_len(a);
        let m: &Modulus = &self.modulus;
        izip!(a.iter_mut(), &self.psi_powers).for_each(|(a, psi)| *a = m.mul_lazy(*a, *psi));
        self.bit_reverse(a);
        self.butterflies(a, &self.psi_powers);
        if !LAZY {
            a.iter_mut().for_each(|x| *x = m.finalize(*x));
        }
    }

    pub fn backward_inplace<const LAZY: bool>(&self, a: &mut [u64]) {
        self.check_len(a);
        let m: &Modulus = &self.modulus;
        self.bit_reverse(a);
        self.butterflies(a, &self.psi_inv_powers);
        izip!(a.iter_mut(), &self.scaled_psi_inv_powers).for_each(|(a, s)| {
            *a = m.mul_lazy(*a, *s);
            if !LAZY {
                *a = m.finalize(*a);
            }
        });
    }

    #[inline(always)]
    fn check_len(&self, a: &[u64]) {
        assert!(
            a.len() == self.n(),
            "invalid argument a: a.len()={} != n={}",
            a.len(),
            self.n()
        );
    }

    fn bit_reverse(&self, a: &mut [u64]) {
        self.bit_rev.iter().enumerate().for_each(|(i, &j)| {
            if i < j {
                a.swap(i, j);
            }
        });
    }

    /// Radix-2 decimation-in-time network on bit-reversed input.
    ///
    /// Stage `log_m` pairs entries `2^(log_m-1)` apart and uses the twiddle
    /// `table[i << (1 + log_n - log_m)]`. Values stay below the lazy bound of
    /// the modulus between stages.
    fn butterflies(&self, a: &mut [u64], table: &[u64]) {
        let m: &Modulus = &self.modulus;
        let bound: u64 = m.lazy_bound();
        for log_m in 1..=self.log_n {
            let half: usize = 1 << (log_m - 1);
            let shift: usize = 1 + self.log_n - log_m;
            a.chunks_exact_mut(half << 1).for_each(|block| {
                let (evens, odds) = block.split_at_mut(half);
                izip!(evens.iter_mut(), odds.iter_mut())
                    .enumerate()
                    .for_each(|(i, (even, odd))| {
                        if *odd == 0 {
                            *odd = *even;
                            return;
                        }
                        let w: u64 = m.mul_lazy(table[i << shift], *odd);
                        let e: u64 = m.reduce_lazy(*even);
                        *even = e + w;
                        *odd = e + bound - w;
                    });
            });
        }
    }
}

impl DFT<u64> for Table {
    fn forward_inplace(&self, a: &mut [u64]) {
        self.forward_inplace::<false>(a)
    }

    fn forward_inplace_lazy(&self, a: &mut [u64]) {
        self.forward_inplace::<true>(a)
    }

    fn backward_inplace(&self, a: &mut [u64]) {
        self.backward_inplace::<false>(a)
    }

    fn backward_inplace_lazy(&self, a: &mut [u64]) {
        self.backward_inplace::<true>(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::fast::{LOG_N, P, PSI_P, PSI_Q, Q};
    use crate::modulus::mod_exp;
    use sampling::Source;

    fn naive_forward(a: &[u64], psi: u64, q: u64) -> Vec<u64> {
        let two_n: u64 = 2 * a.len() as u64;
        (0..a.len())
            .map(|j| {
                let x: u64 = mod_exp(psi, (2 * j as u64 + 1) % two_n, q);
                a.iter().rev().fold(0u64, |acc, &c| {
                    ((acc as u128 * x as u128 + c as u128) % q as u128) as u64
                })
            })
            .collect()
    }

    #[test]
    fn matches_naive_evaluation() {
        let log_n: usize = 4;
        let n: usize = 1 << log_n;
        let mut source: Source = Source::new([0u8; 32]);
        for (q, psi_4096) in [(Q, PSI_Q), (P, PSI_P)] {
            let psi: u64 = mod_exp(psi_4096, 4096 / (2 * n as u64), q);
            for modulus in [Modulus::fast(q).unwrap(), Modulus::generic(q).unwrap()] {
                let table: Table = Table::new(modulus, psi, log_n).unwrap();
                let a: Vec<u64> = (0..n).map(|_| source.next_u64n(q, q.mask())).collect();
                let mut b: Vec<u64> = a.clone();
                table.forward_inplace::<false>(&mut b);
                assert_eq!(b, naive_forward(&a, psi, q));
            }
        }
    }

    #[test]
    fn round_trip_full_degree() {
        let mut source: Source = Source::new([1u8; 32]);
        for (q, psi) in [(Q, PSI_Q), (P, PSI_P)] {
            for fast in [true, false] {
                let table: Table = Table::new(Modulus::new(q, fast).unwrap(), psi, LOG_N).unwrap();
                let a: Vec<u64> = (0..1 << LOG_N).map(|_| source.next_u64n(q, q.mask())).collect();
                let mut b: Vec<u64> = a.clone();
                table.forward_inplace::<true>(&mut b);
                assert!(b.iter().all(|&x| x < 1 << 63));
                table.backward_inplace::<false>(&mut b);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn sparse_inputs() {
        let table: Table = Table::new(Modulus::FastP, PSI_P, LOG_N).unwrap();
        let mut a: Vec<u64> = vec![0u64; 1 << LOG_N];
        a[0] = 1;
        table.forward_inplace::<false>(&mut a);
        assert!(a.iter().all(|&x| x == 1));
        table.backward_inplace::<false>(&mut a);
        assert_eq!(a[0], 1);
        assert!(a[1..].iter().all(|&x| x == 0));

        let mut zero: Vec<u64> = vec![0u64; 1 << LOG_N];
        table.forward_inplace::<false>(&mut zero);
        assert!(zero.iter().all(|&x| x == 0));
    }

    #[test]
    fn setup_errors() {
        assert_eq!(
            Table::new(Modulus::generic(97).unwrap(), 5, 11).err(),
            Some(MathError::Congruence {
                modulus: 97,
                order: 4096
            })
        );
        assert_eq!(
            Table::new(Modulus::FastP, mod_exp(PSI_P, 2, P), LOG_N).err(),
            Some(MathError::NotPrimitiveRoot {
                psi: mod_exp(PSI_P, 2, P),
                order: 4096,
                modulus: P
            })
        );
        assert_eq!(
            Table::new(Modulus::FastP, PSI_P, 0).err(),
            Some(MathError::InvalidLogN(0))
        );
    }
}
