use math::MathError;
use math::automorphism::Automorphism;
use math::dft::ntt::MAX_LOG_N;
use math::encoding::Encoder;
use math::modulus::fast::{LOG_N, P, PSI_P, PSI_Q, Q};
use math::modulus::Modulus;
use math::nbtheory::root_of_unity;
use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;
use sampling::{DiscreteGaussian, Source};
use tracing::debug;

use crate::error::FvError;

pub const DEFAULT_WINDOW_SIZE: usize = 8;
pub const DEFAULT_SIGMA: f64 = 4.0;
pub const MAX_WINDOW_SIZE: usize = 60;

/// Distribution of secrets and of the encryption randomness `u`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretDistribution {
    /// Uniform over `{-1, 0, 1}`.
    Ternary,
    /// Same discrete Gaussian as the errors.
    Gaussian,
}

#[derive(Clone, Debug)]
pub struct ParametersLiteral {
    pub log_n: usize,
    pub q: u64,
    /// Primitive `2n`-th root modulo q; searched for when absent.
    pub psi_q: Option<u64>,
    pub p: u64,
    /// Primitive `2n`-th root modulo p; searched for when absent.
    pub psi_p: Option<u64>,
    /// Bits per key-switching digit.
    pub window_size: usize,
    pub secret: SecretDistribution,
    pub sigma: f64,
    /// Use the specialised reductions of the two fixed primes.
    pub fast_reduction: bool,
}

impl Default for ParametersLiteral {
    fn default() -> Self {
        Self {
            log_n: LOG_N,
            q: Q,
            psi_q: Some(PSI_Q),
            p: P,
            psi_p: Some(PSI_P),
            window_size: DEFAULT_WINDOW_SIZE,
            secret: SecretDistribution::Ternary,
            sigma: DEFAULT_SIGMA,
            fast_reduction: true,
        }
    }
}

impl ParametersLiteral {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_secret(mut self, secret: SecretDistribution) -> Self {
        self.secret = secret;
        self
    }
}

/// Immutable scheme context shared by every key, encryptor and evaluator.
#[derive(Clone, Debug)]
pub struct Parameters {
    ring_q: Ring,
    encoder: Encoder,
    automorphism: Automorphism,
    delta: u64,
    window_size: usize,
    num_windows: usize,
    secret: SecretDistribution,
    gaussian: DiscreteGaussian,
}

impl Parameters {
    pub fn new(p: &ParametersLiteral) -> Result<Self, FvError> {
        if p.log_n == 0 || p.log_n > MAX_LOG_N {
            return Err(MathError::InvalidLogN(p.log_n).into());
        }
        if p.window_size == 0 || p.window_size > MAX_WINDOW_SIZE {
            return Err(FvError::InvalidWindowSize(p.window_size));
        }
        if p.p < 2 || p.p >= p.q {
            return Err(FvError::InvalidParameters(format!(
                "plaintext modulus p={} must lie in [2, q={})",
                p.p, p.q
            )));
        }
        if !(p.sigma > 0.0 && p.sigma.is_finite()) {
            return Err(FvError::InvalidParameters(format!(
                "sigma={} must be positive",
                p.sigma
            )));
        }

        let two_n: u64 = 2u64 << p.log_n;
        // Root search is deterministic so that missing roots resolve identically everywhere.
        let mut source: Source = Source::new([0u8; 32]);
        let psi_q: u64 = match p.psi_q {
            Some(psi) => psi,
            None => root_of_unity(two_n, p.q, &mut source)?,
        };
        let psi_p: u64 = match p.psi_p {
            Some(psi) => psi,
            None => root_of_unity(two_n, p.p, &mut source)?,
        };

        let ring_q: Ring = Ring::new(p.log_n, Modulus::new(p.q, p.fast_reduction)?, psi_q)?;
        let ring_p: Ring = Ring::new(p.log_n, Modulus::new(p.p, p.fast_reduction)?, psi_p)?;
        let encoder: Encoder = Encoder::new(ring_p)?;
        let automorphism: Automorphism = Automorphism::new(ring_q.n())?;
        let num_windows: usize = 1 + p.q.ilog2() as usize / p.window_size;

        debug!(
            n = ring_q.n(),
            q = p.q,
            p = p.p,
            window_size = p.window_size,
            num_windows,
            fast = p.fast_reduction,
            "fv parameters"
        );

        Ok(Self {
            ring_q,
            encoder,
            automorphism,
            delta: p.q / p.p,
            window_size: p.window_size,
            num_windows,
            secret: p.secret,
            gaussian: DiscreteGaussian::new(p.sigma),
        })
    }

    pub fn n(&self) -> usize {
        self.ring_q.n()
    }

    pub fn log_n(&self) -> usize {
        self.ring_q.log_n()
    }

    pub fn q(&self) -> u64 {
        self.ring_q.q()
    }

    pub fn p(&self) -> u64 {
        self.encoder.ring().q()
    }

    /// `floor(q / p)`.
    pub fn delta(&self) -> u64 {
        self.delta
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `1 + floor(log2 q) / window_size`: enough digits to cover q.
    pub fn num_windows(&self) -> usize {
        self.num_windows
    }

    pub fn secret_distribution(&self) -> SecretDistribution {
        self.secret
    }

    pub fn gaussian(&self) -> &DiscreteGaussian {
        &self.gaussian
    }

    pub fn ring_q(&self) -> &Ring {
        &self.ring_q
    }

    pub fn ring_p(&self) -> &Ring {
        self.encoder.ring()
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn automorphism(&self) -> &Automorphism {
        &self.automorphism
    }

    pub fn encode(&self, values: &[u64]) -> Poly<Coeff> {
        self.encoder.encode(values)
    }

    pub fn decode(&self, pt: &Poly<Coeff>) -> Vec<u64> {
        self.encoder.decode(pt)
    }

    /// Lifts a polynomial with coefficients below q into evaluation form over
    /// q without encryption. The result can be multiplied into or added to a
    /// ciphertext.
    pub fn null_encrypt(&self, pt: &Poly<Coeff>) -> Poly<Eval> {
        let mut lifted: Poly<Coeff> = pt.clone();
        self.ring_q.reduce_inplace(&mut lifted);
        self.ring_q.to_eval(lifted)
    }

    /// `ToEval(delta * pt)` for a plaintext with coefficients in `[0, p]`.
    pub fn scale_plaintext(&self, pt: &Poly<Coeff>) -> Poly<Eval> {
        let p: u64 = self.p();
        let scaled: Vec<u64> = pt.0.iter().map(|&x| (x % p) * self.delta).collect();
        self.ring_q.to_eval(Poly::from_vec(scaled))
    }

    /// Encodes `values` and scales them for [`crate::Evaluator::add_plain`].
    pub fn encode_scaled(&self, values: &[u64]) -> Poly<Eval> {
        self.scale_plaintext(&self.encode(values))
    }

    /// Samples a secret-like polynomial following [`SecretDistribution`].
    pub(crate) fn sample_secret(&self, source: &mut Source) -> Poly<Coeff> {
        let mut s: Poly<Coeff> = self.ring_q.new_poly();
        match self.secret {
            SecretDistribution::Ternary => self.ring_q.fill_ternary(source, &mut s),
            SecretDistribution::Gaussian => self.ring_q.fill_gaussian(&self.gaussian, source, &mut s),
        }
        s
    }

    pub(crate) fn sample_error(&self, source: &mut Source) -> Poly<Coeff> {
        let mut e: Poly<Coeff> = self.ring_q.new_poly();
        self.ring_q.fill_gaussian(&self.gaussian, source, &mut e);
        e
    }

    pub(crate) fn sample_uniform(&self, source: &mut Source) -> Poly<Eval> {
        let mut a: Poly<Eval> = self.ring_q.new_poly();
        self.ring_q.fill_uniform(source, &mut a);
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        assert_eq!(params.n(), 2048);
        assert_eq!(params.delta(), 2069665230847);
        assert_eq!(params.num_windows(), 8);
        assert_eq!(params.q(), params.delta() * params.p() + 2);
    }

    #[test]
    fn window_counts() {
        for (ws, nw) in [(1, 60), (8, 8), (9, 7), (20, 3), (59, 2), (60, 1)] {
            let params: Parameters =
                Parameters::new(&ParametersLiteral::default().with_window_size(ws)).unwrap();
            assert_eq!(params.num_windows(), nw, "ws={}", ws);
            assert!(params.num_windows() * ws >= 60);
        }
        assert!(matches!(
            Parameters::new(&ParametersLiteral::default().with_window_size(0)),
            Err(FvError::InvalidWindowSize(0))
        ));
    }

    #[test]
    fn ring_degree_range() {
        for log_n in [0, 18, 64, 200] {
            let literal: ParametersLiteral = ParametersLiteral {
                log_n,
                ..ParametersLiteral::default()
            };
            assert!(
                matches!(
                    Parameters::new(&literal),
                    Err(FvError::Math(MathError::InvalidLogN(l))) if l == log_n
                ),
                "log_n={}",
                log_n
            );
        }
    }

    #[test]
    fn root_search_and_generic_path() {
        let literal: ParametersLiteral = ParametersLiteral {
            psi_q: None,
            psi_p: None,
            fast_reduction: false,
            ..ParametersLiteral::default()
        };
        let params: Parameters = Parameters::new(&literal).unwrap();
        let values: Vec<u64> = (0..2048).collect();
        assert_eq!(params.decode(&params.encode(&values)), values);
    }

    #[test]
    fn fast_path_requires_fixed_primes() {
        let literal: ParametersLiteral = ParametersLiteral {
            p: 65537,
            psi_p: None,
            ..ParametersLiteral::default()
        };
        assert!(matches!(
            Parameters::new(&literal),
            Err(FvError::Math(math::MathError::NoFastPath(65537)))
        ));
    }
}
