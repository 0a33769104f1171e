use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;
use sampling::Source;
use sampling::source::new_seed;

use crate::ciphertext::Ciphertext;
use crate::keys::{PublicKey, SecretKey};
use crate::parameters::Parameters;

/// Secret- and public-key encryption of plaintext polynomials mod p.
pub struct Encryptor {
    source_xa: Source,
    source_xe: Source,
    source_xu: Source,
}

impl Default for Encryptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Encryptor {
    pub fn new() -> Self {
        Self::with_seed(new_seed())
    }

    pub fn with_seed(seed: [u8; 32]) -> Self {
        let mut root: Source = Source::new(seed);
        let (_, source_xa) = root.branch();
        let (_, source_xe) = root.branch();
        let (_, source_xu) = root.branch();
        Self {
            source_xa,
            source_xe,
            source_xu,
        }
    }

    pub fn seed_source_xa(&mut self, seed: [u8; 32]) {
        self.source_xa = Source::new(seed)
    }

    pub fn seed_source_xe(&mut self, seed: [u8; 32]) {
        self.source_xe = Source::new(seed)
    }

    /// `(a, ToEval(e + delta·pt) - a·s)` with `a` uniform.
    pub fn encrypt_sk(&mut self, params: &Parameters, sk: &SecretKey, pt: &Poly<Coeff>) -> Ciphertext {
        let ring: &Ring = params.ring_q();
        let a: Poly<Eval> = params.sample_uniform(&mut self.source_xa);
        let mut b: Poly<Eval> = self.scaled_with_error(params, pt);
        ring.sub_inplace(&mut b, &ring.mul(&a, sk.s()));
        Ciphertext { a, b }
    }

    /// `(pk.a·u + ToEval(e1), pk.b·u + ToEval(delta·pt + e2))` with `u` drawn
    /// like the secret.
    pub fn encrypt_pk(&mut self, params: &Parameters, pk: &PublicKey, pt: &Poly<Coeff>) -> Ciphertext {
        let ring: &Ring = params.ring_q();
        let u: Poly<Eval> = ring.to_eval(params.sample_secret(&mut self.source_xu));

        let mut a: Poly<Eval> = ring.to_eval(params.sample_error(&mut self.source_xe));
        ring.mul_add_inplace(&pk.a, &u, &mut a);

        let mut b: Poly<Eval> = self.scaled_with_error(params, pt);
        ring.mul_add_inplace(&pk.b, &u, &mut b);

        Ciphertext { a, b }
    }

    /// `ToEval(delta·pt + e)`.
    fn scaled_with_error(&mut self, params: &Parameters, pt: &Poly<Coeff>) -> Poly<Eval> {
        let ring: &Ring = params.ring_q();
        let mut m: Poly<Eval> = params.scale_plaintext(pt);
        ring.add_inplace(&mut m, &ring.to_eval(params.sample_error(&mut self.source_xe)));
        m
    }
}
