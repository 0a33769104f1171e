use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;
use sampling::Source;
use sampling::source::new_seed;
use tracing::{debug, instrument};

use crate::error::FvError;
use crate::keys::{KeySwitchKey, PublicKey, RotationKeys, SecretKey};
use crate::parameters::Parameters;

/// Generates secret, public, switching and rotation keys.
///
/// Secrets, uniform masks and errors are drawn from three independent sources.
pub struct KeyGenerator {
    source_xs: Source,
    source_xa: Source,
    source_xe: Source,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::with_seed(new_seed())
    }

    /// Deterministic generator; every stream is derived from `seed`.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let mut root: Source = Source::new(seed);
        let (_, source_xs) = root.branch();
        let (_, source_xa) = root.branch();
        let (_, source_xe) = root.branch();
        Self {
            source_xs,
            source_xa,
            source_xe,
        }
    }

    pub fn gen_secret_key(&mut self, params: &Parameters) -> SecretKey {
        let s: Poly<Coeff> = params.sample_secret(&mut self.source_xs);
        SecretKey {
            s: params.ring_q().to_eval(s),
            dist: params.secret_distribution(),
        }
    }

    /// `pk = (a, ToEval(e) - a·s)`.
    pub fn gen_public_key(&mut self, params: &Parameters, sk: &SecretKey) -> PublicKey {
        let (a, b) = self.encrypt_zero(params, &sk.s);
        PublicKey { a, b }
    }

    pub fn gen_keypair(&mut self, params: &Parameters) -> (SecretKey, PublicKey) {
        let sk: SecretKey = self.gen_secret_key(params);
        let pk: PublicKey = self.gen_public_key(params, &sk);
        (sk, pk)
    }

    /// Key switching from `orig` to `new`: row `i` encrypts `2^(i·w)·orig`
    /// under `new`.
    pub fn gen_switching_key(
        &mut self,
        params: &Parameters,
        orig: &Poly<Eval>,
        new: &SecretKey,
    ) -> KeySwitchKey {
        let ring: &Ring = params.ring_q();
        let rows: Vec<(Poly<Eval>, Poly<Eval>)> = (0..params.num_windows())
            .map(|i| {
                let (a, mut b) = self.encrypt_zero(params, &new.s);
                let mut gadget: Poly<Eval> = orig.clone();
                ring.mul_scalar_inplace(&mut gadget, pow2_mod(i * params.window_size(), ring));
                ring.add_inplace(&mut b, &gadget);
                (a, b)
            })
            .collect();
        KeySwitchKey { rows }
    }

    /// One switching key per rotation, from `automorph(s, rot)` back to `s`.
    #[instrument(skip_all, fields(count = rotations.len()))]
    pub fn gen_rotation_keys(
        &mut self,
        params: &Parameters,
        sk: &SecretKey,
        rotations: &[usize],
    ) -> Result<RotationKeys, FvError> {
        let mut keys: RotationKeys = RotationKeys::new();
        for &rot in rotations {
            if keys.contains(rot) {
                continue;
            }
            let rotated: Poly<Eval> = params.automorphism().automorph(&sk.s, rot)?;
            let key: KeySwitchKey = self.gen_switching_key(params, &rotated, sk);
            keys.insert(rot, key);
        }
        debug!(keys = keys.len(), "rotation keys generated");
        Ok(keys)
    }

    /// `(a, ToEval(e) - a·s)` with `a` uniform.
    fn encrypt_zero(&mut self, params: &Parameters, s: &Poly<Eval>) -> (Poly<Eval>, Poly<Eval>) {
        let ring: &Ring = params.ring_q();
        let a: Poly<Eval> = params.sample_uniform(&mut self.source_xa);
        let mut b: Poly<Eval> = ring.to_eval(params.sample_error(&mut self.source_xe));
        ring.sub_inplace(&mut b, &ring.mul(&a, s));
        (a, b)
    }
}

fn pow2_mod(exp: usize, ring: &Ring) -> u64 {
    ring.modulus.pow(2, exp as u64)
}
