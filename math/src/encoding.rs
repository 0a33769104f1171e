use crate::automorphism::Automorphism;
use crate::error::MathError;
use crate::poly::{Coeff, Eval, Poly};
use crate::ring::Ring;

/// SIMD packing of `n` plaintext values into one element of the plaintext ring.
///
/// Slot `s` is the evaluation at `psi^g_s`, with `g_s` the Galois element of
/// rotation `s`, so that rotating a packed element rotates its slots.
#[derive(Clone, Debug)]
pub struct Encoder {
    ring: Ring,
    positions: Vec<usize>,
}

impl Encoder {
    pub fn new(ring: Ring) -> Result<Self, MathError> {
        let auto: Automorphism = Automorphism::new(ring.n())?;
        let positions: Vec<usize> = (0..ring.n()).map(|s| auto.slot_position(s)).collect();
        Ok(Self { ring, positions })
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn slots(&self) -> usize {
        self.positions.len()
    }

    /// Packs `values` (zero padded to `n`, reduced mod p) into a polynomial.
    pub fn encode(&self, values: &[u64]) -> Poly<Coeff> {
        assert!(
            values.len() <= self.slots(),
            "invalid argument values: len={} > slots={}",
            values.len(),
            self.slots()
        );
        let m = &self.ring.modulus;
        let mut eval: Poly<Eval> = self.ring.new_poly();
        values
            .iter()
            .zip(self.positions.iter())
            .for_each(|(&v, &pos)| eval.0[pos] = m.reduce(v));
        self.ring.to_coeff(eval)
    }

    /// Unpacks `n` values in `[0, p)`; coefficients may be any word.
    pub fn decode(&self, pt: &Poly<Coeff>) -> Vec<u64> {
        let mut coeffs: Poly<Coeff> = pt.clone();
        self.ring.reduce_inplace(&mut coeffs);
        let eval: Poly<Eval> = self.ring.to_eval(coeffs);
        self.positions.iter().map(|&pos| eval.0[pos]).collect()
    }
}
