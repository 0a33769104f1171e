use math::automorphism::Automorphism;
use math::modulus::WordOps;
use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;
use sampling::Source;
use tracing::trace;

use crate::ciphertext::Ciphertext;
use crate::error::FvError;
use crate::evaluator::Evaluator;
use crate::keys::KeySwitchKey;

/// Base-`2^w` digits of a ciphertext's `a` component, each in evaluation form.
///
/// Computed once with [`Evaluator::hoisted_decompose`] and reused for every
/// rotation of the same ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digits(pub Vec<Poly<Eval>>);

impl Digits {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Evaluator<'_> {
    pub fn hoisted_decompose(&self, ct: &Ciphertext) -> Digits {
        let ring: &Ring = self.params.ring_q();
        let a: Poly<Coeff> = ring.to_coeff(ct.a.clone());
        Digits(
            a.decompose(self.params.window_size(), self.params.num_windows())
                .into_iter()
                .map(|d| ring.to_eval(d))
                .collect(),
        )
    }

    /// `(Σ d_i·a_i, b + Σ d_i·b_i)` with both sums accumulated in 128 bits.
    pub fn keyswitch_digits(
        &self,
        key: &KeySwitchKey,
        b: &Poly<Eval>,
        digits: &Digits,
    ) -> Result<Ciphertext, FvError> {
        if key.num_windows() != digits.len() {
            return Err(FvError::LengthMismatch {
                expected: key.num_windows(),
                got: digits.len(),
            });
        }
        let ring: &Ring = self.params.ring_q();
        let a: Poly<Eval> = ring.dot_product(digits.0.iter().zip(key.rows.iter().map(|(a, _)| a)));
        let mut acc: Poly<Eval> =
            ring.dot_product(digits.0.iter().zip(key.rows.iter().map(|(_, b)| b)));
        ring.add_inplace(&mut acc, b);
        Ok(Ciphertext { a, b: acc })
    }

    /// Re-encrypts `ct` under the target key of `key`.
    pub fn keyswitch(&self, key: &KeySwitchKey, ct: &Ciphertext) -> Result<Ciphertext, FvError> {
        let digits: Digits = self.hoisted_decompose(ct);
        self.keyswitch_digits(key, &ct.b, &digits)
    }

    /// Rotates `ct` using digits previously computed for it.
    ///
    /// Rotation 0 returns `ct` unchanged; any other rotation needs its key.
    pub fn automorphism_digits(
        &self,
        rot: usize,
        ct: &Ciphertext,
        digits: &Digits,
    ) -> Result<Ciphertext, FvError> {
        if rot == 0 {
            return Ok(ct.clone());
        }
        let key: &KeySwitchKey = self.key(rot)?;
        let auto: &Automorphism = self.params.automorphism();
        let b: Poly<Eval> = auto.automorph(&ct.b, rot)?;
        let rotated: Digits = Digits(
            digits
                .0
                .iter()
                .map(|d| auto.automorph(d, rot))
                .collect::<Result<_, _>>()?,
        );
        trace!(rot, "automorphism");
        self.keyswitch_digits(key, &b, &rotated)
    }

    pub fn automorphism(&self, rot: usize, ct: &Ciphertext) -> Result<Ciphertext, FvError> {
        if rot == 0 {
            return Ok(ct.clone());
        }
        let digits: Digits = self.hoisted_decompose(ct);
        self.automorphism_digits(rot, ct, &digits)
    }

    /// Adds the encoding of a uniform vector mod p whose slot 0 is zero.
    /// The added term sits below delta and masks the low-order noise.
    pub fn add_random_noise(&self, ct: &mut Ciphertext, source: &mut Source) {
        let p: u64 = self.params.p();
        let mask: u64 = p.mask();
        let mut r: Vec<u64> = (0..self.params.n())
            .map(|_| source.next_u64n(p, mask))
            .collect();
        r[0] = 0;
        let noise: Poly<Eval> = self.params.null_encrypt(&self.params.encode(&r));
        self.params.ring_q().add_inplace(&mut ct.b, &noise);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptor::Encryptor;
    use crate::key_generator::KeyGenerator;
    use crate::keys::{RotationKeys, SecretKey};
    use crate::parameters::{Parameters, ParametersLiteral};

    #[test]
    fn keyswitch_to_same_key_preserves_plaintext() {
        let params: Parameters =
            Parameters::new(&ParametersLiteral::default().with_window_size(20)).unwrap();
        let mut kgen: KeyGenerator = KeyGenerator::with_seed([5u8; 32]);
        let sk: SecretKey = kgen.gen_secret_key(&params);
        let key: KeySwitchKey = kgen.gen_switching_key(&params, sk.s(), &sk);
        let values: Vec<u64> = (0..2048).map(|i| i * 3).collect();
        let ct: Ciphertext =
            Encryptor::with_seed([6u8; 32]).encrypt_sk(&params, &sk, &params.encode(&values));
        let eval: Evaluator = Evaluator::new(&params);
        let switched: Ciphertext = eval.keyswitch(&key, &ct).unwrap();
        assert_eq!(params.decrypt_decode(&sk, &switched), values);
    }

    #[test]
    fn digit_count_must_match_key() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let mut kgen: KeyGenerator = KeyGenerator::with_seed([5u8; 32]);
        let sk: SecretKey = kgen.gen_secret_key(&params);
        let keys: RotationKeys = kgen.gen_rotation_keys(&params, &sk, &[1]).unwrap();
        let eval: Evaluator = Evaluator::with_keys(&params, &keys);
        let ct: Ciphertext = Ciphertext::new(params.n());
        let mut digits: Digits = eval.hoisted_decompose(&ct);
        assert_eq!(digits.len(), 8);
        digits.0.pop();
        assert!(matches!(
            eval.automorphism_digits(1, &ct, &digits),
            Err(FvError::LengthMismatch { expected: 8, got: 7 })
        ));
        assert!(matches!(
            eval.automorphism(2, &ct),
            Err(FvError::MissingRotationKey(2))
        ));
    }

    #[test]
    fn random_noise_keeps_first_slot() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let sk: SecretKey = KeyGenerator::with_seed([8u8; 32]).gen_secret_key(&params);
        let values: Vec<u64> = vec![42; 2048];
        let mut ct: Ciphertext =
            Encryptor::with_seed([9u8; 32]).encrypt_sk(&params, &sk, &params.encode(&values));
        let eval: Evaluator = Evaluator::new(&params);
        eval.add_random_noise(&mut ct, &mut Source::new([1u8; 32]));
        let out: Vec<u64> = params.decrypt_decode(&sk, &ct);
        assert_eq!(out[0], 42);
        assert!(params.noise_margin(&sk, &ct) > 1.0);
    }
}
