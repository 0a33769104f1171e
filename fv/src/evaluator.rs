use math::poly::{Eval, Poly};
use math::ring::Ring;

use crate::ciphertext::Ciphertext;
use crate::error::FvError;
use crate::keys::{KeySwitchKey, RotationKeys};
use crate::parameters::Parameters;

/// Homomorphic operations over ciphertexts in evaluation form.
///
/// Plaintext operands are `Poly<Eval>` over q: [`Parameters::encode_scaled`]
/// for additions and [`Parameters::null_encrypt`] for multiplications.
/// An evaluator borrows its context and is cheap to clone across threads.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    pub(crate) params: &'a Parameters,
    pub(crate) keys: Option<&'a RotationKeys>,
}

impl<'a> Evaluator<'a> {
    /// Evaluator without rotation keys; only rotation 0 is available.
    pub fn new(params: &'a Parameters) -> Self {
        Self { params, keys: None }
    }

    pub fn with_keys(params: &'a Parameters, keys: &'a RotationKeys) -> Self {
        Self {
            params,
            keys: Some(keys),
        }
    }

    pub fn params(&self) -> &'a Parameters {
        self.params
    }

    pub fn keys(&self) -> Option<&'a RotationKeys> {
        self.keys
    }

    /// Key of rotation `rot`, missing as well when no store is attached.
    pub fn key(&self, rot: usize) -> Result<&'a KeySwitchKey, FvError> {
        self.keys
            .ok_or(FvError::MissingRotationKey(rot))?
            .get(rot)
    }

    fn ring(&self) -> &'a Ring {
        self.params.ring_q()
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.add_inplace(&mut c, b);
        c
    }

    pub fn add_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) {
        let ring: &Ring = self.ring();
        ring.add_inplace(&mut a.a, &b.a);
        ring.add_inplace(&mut a.b, &b.b);
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.sub_inplace(&mut c, b);
        c
    }

    pub fn sub_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) {
        let ring: &Ring = self.ring();
        ring.sub_inplace(&mut a.a, &b.a);
        ring.sub_inplace(&mut a.b, &b.b);
    }

    pub fn negate(&self, a: &Ciphertext) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.negate_inplace(&mut c);
        c
    }

    pub fn negate_inplace(&self, a: &mut Ciphertext) {
        let ring: &Ring = self.ring();
        ring.neg_inplace(&mut a.a);
        ring.neg_inplace(&mut a.b);
    }

    /// Adds a scaled plaintext; only `b` changes.
    pub fn add_plain(&self, a: &Ciphertext, pt: &Poly<Eval>) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.add_plain_inplace(&mut c, pt);
        c
    }

    pub fn add_plain_inplace(&self, a: &mut Ciphertext, pt: &Poly<Eval>) {
        self.ring().add_inplace(&mut a.b, pt);
    }

    pub fn sub_plain(&self, a: &Ciphertext, pt: &Poly<Eval>) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.sub_plain_inplace(&mut c, pt);
        c
    }

    pub fn sub_plain_inplace(&self, a: &mut Ciphertext, pt: &Poly<Eval>) {
        self.ring().sub_inplace(&mut a.b, pt);
    }

    /// Pointwise product of both components with an unscaled plaintext.
    pub fn mult_plain(&self, a: &Ciphertext, pt: &Poly<Eval>) -> Ciphertext {
        let mut c: Ciphertext = a.clone();
        self.mult_plain_inplace(&mut c, pt);
        c
    }

    pub fn mult_plain_inplace(&self, a: &mut Ciphertext, pt: &Poly<Eval>) {
        let ring: &Ring = self.ring();
        ring.mul_inplace(&mut a.a, pt);
        ring.mul_inplace(&mut a.b, pt);
    }

    /// `acc += a · pt` on both components.
    pub fn mult_plain_add_inplace(&self, a: &Ciphertext, pt: &Poly<Eval>, acc: &mut Ciphertext) {
        let ring: &Ring = self.ring();
        ring.mul_add_inplace(&a.a, pt, &mut acc.a);
        ring.mul_add_inplace(&a.b, pt, &mut acc.b);
    }

    /// A ciphertext of zero with no noise.
    pub fn zero(&self) -> Ciphertext {
        Ciphertext::new(self.params.n())
    }
}
