use crate::error::MathError;
use crate::poly::{Coeff, Eval, Poly};

/// Generator of the slot rotation subgroup of `(Z/2nZ)^*`.
pub const GALOIS_GENERATOR: usize = 5;

/// Galois elements indexed by rotation.
///
/// Rotation `r < n/2` maps to `5^r mod 2n`, rotation `r + n/2` to
/// `-5^r mod 2n`. Applied to a packed plaintext, rotation `r` rotates both
/// lanes of `n/2` slots left by `r mod n/2`, and swaps the lanes when
/// `r >= n/2`.
#[derive(Clone, Debug)]
pub struct Automorphism {
    galois: Vec<usize>,
}

impl Automorphism {
    pub fn new(n: usize) -> Result<Self, MathError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(MathError::NotPowerOfTwo(n));
        }
        let two_n: usize = n << 1;
        let half: usize = n >> 1;
        let mut galois: Vec<usize> = vec![0usize; n];
        let mut g: usize = 1;
        for i in 0..half {
            galois[i] = g;
            galois[i + half] = two_n - g;
            g = (g * GALOIS_GENERATOR) & (two_n - 1);
        }
        Ok(Self { galois })
    }

    pub fn n(&self) -> usize {
        self.galois.len()
    }

    pub fn galois_element(&self, rot: usize) -> Result<usize, MathError> {
        self.galois
            .get(rot)
            .copied()
            .ok_or(MathError::InvalidRotation { rot, n: self.n() })
    }

    /// Position, in natural NTT order, of the evaluation backing slot `slot`.
    pub fn slot_position(&self, slot: usize) -> usize {
        (self.galois[slot] - 1) >> 1
    }

    /// Applies `X -> X^g` to an element in evaluation form.
    ///
    /// Output slot `j` reads input slot `(g(2j+1) - 1)/2 mod n`, visited with
    /// a running index advanced by `g`.
    pub fn automorph(&self, a: &Poly<Eval>, rot: usize) -> Result<Poly<Eval>, MathError> {
        let n: usize = self.n();
        assert!(
            a.n() == n,
            "invalid argument a: a.n()={} != n={}",
            a.n(),
            n
        );
        let g: usize = self.galois_element(rot)?;
        if g == 1 {
            return Ok(a.clone());
        }
        let mask: usize = n - 1;
        let mut idx: usize = ((g + 1) >> 1) - 1;
        let mut out: Vec<u64> = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(a.0[idx]);
            idx = (idx + g) & mask;
        }
        Ok(Poly::from_vec(out))
    }

    /// Applies `X -> X^g` to an element in coefficient form.
    pub fn automorph_coeff(
        &self,
        a: &Poly<Coeff>,
        rot: usize,
        q: u64,
    ) -> Result<Poly<Coeff>, MathError> {
        let n: usize = self.n();
        let g: usize = self.galois_element(rot)?;
        let mut out: Vec<u64> = vec![0u64; n];
        a.0.iter().enumerate().for_each(|(i, &x)| {
            let j: usize = (i * g) % (n << 1);
            if j < n {
                out[j] = x;
            } else {
                out[j - n] = if x == 0 { 0 } else { q - x };
            }
        });
        Ok(Poly::from_vec(out))
    }

    /// The same rotation expressed directly on slot vectors.
    pub fn automorph_slots(&self, v: &[u64], rot: usize) -> Result<Vec<u64>, MathError> {
        let n: usize = self.n();
        assert!(v.len() == n, "invalid argument v: v.len()={} != n={}", v.len(), n);
        if rot >= n {
            return Err(MathError::InvalidRotation { rot, n });
        }
        let half: usize = n >> 1;
        let inner: usize = rot & (half - 1);
        let (lo, hi) = if rot & half != 0 { (half, 0) } else { (0, half) };
        let mut out: Vec<u64> = vec![0u64; n];
        for i in 0..half {
            let src: usize = (i + inner) & (half - 1);
            out[i] = v[src + lo];
            out[i + half] = v[src + hi];
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn galois_table() {
        let auto: Automorphism = Automorphism::new(2048).unwrap();
        assert_eq!(auto.galois_element(0), Ok(1));
        assert_eq!(auto.galois_element(1), Ok(5));
        assert_eq!(auto.galois_element(2), Ok(25));
        assert_eq!(auto.galois_element(1024), Ok(4095));
        assert_eq!(
            auto.galois_element(2048),
            Err(MathError::InvalidRotation { rot: 2048, n: 2048 })
        );
        let mut positions: Vec<usize> = (0..2048).map(|s| auto.slot_position(s)).collect();
        positions.sort();
        assert!(positions.iter().enumerate().all(|(i, &p)| i == p));
    }

    #[test]
    fn slot_rotation_and_swap() {
        let auto: Automorphism = Automorphism::new(8).unwrap();
        let v: Vec<u64> = (0..8).collect();
        assert_eq!(auto.automorph_slots(&v, 0).unwrap(), v);
        assert_eq!(auto.automorph_slots(&v, 1).unwrap(), vec![1, 2, 3, 0, 5, 6, 7, 4]);
        assert_eq!(auto.automorph_slots(&v, 4).unwrap(), vec![4, 5, 6, 7, 0, 1, 2, 3]);
        assert_eq!(auto.automorph_slots(&v, 6).unwrap(), vec![6, 7, 4, 5, 2, 3, 0, 1]);
        assert!(auto.automorph_slots(&v, 8).is_err());
    }

    #[test]
    fn eval_automorphism_is_a_permutation() {
        let auto: Automorphism = Automorphism::new(16).unwrap();
        let a: Poly<Eval> = Poly::from_vec((0..16).collect());
        for rot in 0..16 {
            let mut b: Vec<u64> = auto.automorph(&a, rot).unwrap().into_vec();
            b.sort();
            assert_eq!(b, a.0);
        }
    }
}
