use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;

use crate::ciphertext::Ciphertext;
use crate::keys::SecretKey;
use crate::parameters::Parameters;

impl Parameters {
    /// `ToCoeff(a·s + b)`, fully reduced: `delta·m + e` up to multiples of q.
    fn phase(&self, sk: &SecretKey, ct: &Ciphertext) -> Poly<Coeff> {
        let ring: &Ring = self.ring_q();
        let mut x: Poly<Eval> = ct.b.clone();
        ring.mul_add_inplace(&ct.a, sk.s(), &mut x);
        ring.to_coeff(x)
    }

    /// Rounds the phase to the nearest multiple of delta. Coefficients lie in
    /// `[0, p]`; the value p stands for 0 and is reduced by decoding.
    pub fn decrypt(&self, sk: &SecretKey, ct: &Ciphertext) -> Poly<Coeff> {
        let delta: u64 = self.delta();
        let half: u64 = delta >> 1;
        let mut x: Poly<Coeff> = self.phase(sk, ct);
        x.0.iter_mut().for_each(|x| *x = (*x + half) / delta);
        x
    }

    /// Decrypts and decodes into `n` slot values mod p.
    pub fn decrypt_decode(&self, sk: &SecretKey, ct: &Ciphertext) -> Vec<u64> {
        self.decode(&self.decrypt(sk, ct))
    }

    /// Centred residue of the phase modulo delta, per coefficient.
    pub fn noise(&self, sk: &SecretKey, ct: &Ciphertext) -> Vec<i64> {
        let delta: u64 = self.delta();
        self.phase(sk, ct)
            .0
            .iter()
            .map(|&x| {
                let r: u64 = x % delta;
                if r > delta >> 1 {
                    -((delta - r) as i64)
                } else {
                    r as i64
                }
            })
            .collect()
    }

    /// `log2(delta) - log2(max |noise|)`; decryption is correct while this
    /// stays above one bit. Infinite for noiseless ciphertexts.
    pub fn noise_margin(&self, sk: &SecretKey, ct: &Ciphertext) -> f64 {
        let max: u64 = self
            .noise(sk, ct)
            .iter()
            .map(|x| x.unsigned_abs())
            .max()
            .unwrap_or(0);
        if max == 0 {
            return f64::INFINITY;
        }
        (self.delta() as f64).log2() - (max as f64).log2()
    }
}
