use rand_distr::Distribution;

use crate::source::Source;

/// Tail mass below which the cumulative table is truncated.
const TAIL_ACCURACY: f64 = 1e-15;

/// Discrete Gaussian over the integers, sampled by CDF inversion.
///
/// The table stores the cumulative mass of `1..=bound` on one side of zero;
/// a uniform draw in `[-1/2, 1/2)` falls either in the central band of width
/// `mass_zero` (sample 0) or is located in the table by binary search and
/// signed by the draw.
#[derive(Clone, Debug)]
pub struct DiscreteGaussian {
    sigma: f64,
    mass_zero: f64,
    cumulative: Vec<f64>,
}

impl DiscreteGaussian {
    pub fn new(sigma: f64) -> Self {
        assert!(
            sigma > 0.0 && sigma.is_finite(),
            "invalid argument sigma: {} must be positive and finite",
            sigma
        );
        let variance: f64 = sigma * sigma;
        let bound: usize = (sigma * (-2.0 * TAIL_ACCURACY.ln()).sqrt()).ceil() as usize;
        let weight = |x: usize| (-((x * x) as f64) / (2.0 * variance)).exp();

        let total: f64 = 1.0 + 2.0 * (1..=bound).map(weight).sum::<f64>();
        let mass_zero: f64 = 1.0 / total;

        let cumulative: Vec<f64> = (1..=bound)
            .scan(0.0, |acc, x| {
                *acc += mass_zero * weight(x);
                Some(*acc)
            })
            .collect();

        Self {
            sigma,
            mass_zero,
            cumulative,
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Largest magnitude this sampler can return.
    pub fn bound(&self) -> i64 {
        self.cumulative.len() as i64
    }

    /// Maps a uniform draw in `[-1/2, 1/2)` to a sample.
    fn invert(&self, seed: f64) -> i64 {
        let half_zero: f64 = self.mass_zero / 2.0;
        if seed.abs() <= half_zero {
            return 0;
        }
        let search: f64 = seed.abs() - half_zero;
        let idx: usize = self
            .cumulative
            .partition_point(|&c| c < search)
            .min(self.cumulative.len() - 1);
        let magnitude: i64 = idx as i64 + 1;
        if seed > 0.0 {
            magnitude
        } else {
            -magnitude
        }
    }

    /// Samples and maps the result into `[0, q)`.
    pub fn sample_mod(&self, source: &mut Source, q: u64) -> u64 {
        signed_to_mod(self.sample(source), q)
    }
}

impl Distribution<i64> for DiscreteGaussian {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let seed: f64 = rng.random::<f64>() - 0.5;
        self.invert(seed)
    }
}

/// Represents a small signed integer in `[0, q)`.
#[inline(always)]
pub fn signed_to_mod(x: i64, q: u64) -> u64 {
    if x < 0 {
        q - x.unsigned_abs()
    } else {
        x as u64
    }
}

/// Uniform draw in `{-1, 0, 1}`.
#[inline(always)]
pub fn sample_ternary(source: &mut Source) -> i64 {
    source.next_u64n(3, 0b11) as i64 - 1
}

/// Uniform draw in `{0, 1}`.
#[inline(always)]
pub fn sample_binary(source: &mut Source) -> u64 {
    source.next_bit()
}

/// Gaussian vector reduced into `[0, p)` after clamping to `[-127, 128]`.
/// Used as realistic small-magnitude test inputs.
pub fn gaussian_test_vector(source: &mut Source, len: usize, p: u64, sigma: f64) -> Vec<u64> {
    let dist: DiscreteGaussian = DiscreteGaussian::new(sigma);
    (0..len)
        .map(|_| signed_to_mod(dist.sample(source).clamp(-127, 128), p))
        .collect()
}

/// Uniform vector in `[0, max)`.
pub fn uniform_test_vector(source: &mut Source, len: usize, max: u64) -> Vec<u64> {
    let mask: u64 = u64::MAX >> (max - 1).leading_zeros().min(63);
    (0..len).map(|_| source.next_u64n(max, mask)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_table_shape() {
        let dist: DiscreteGaussian = DiscreteGaussian::new(4.0);
        // ceil(4 * sqrt(-2 ln 1e-15))
        assert_eq!(dist.bound(), 34);
        let last: f64 = *dist.cumulative.last().unwrap();
        assert!((last - (1.0 - dist.mass_zero) / 2.0).abs() < 1e-12);
        assert!(dist.cumulative.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn gaussian_inversion_edges() {
        let dist: DiscreteGaussian = DiscreteGaussian::new(4.0);
        assert_eq!(dist.invert(0.0), 0);
        assert_eq!(dist.invert(dist.mass_zero / 2.0), 0);
        assert_eq!(dist.invert(0.4999999), -dist.invert(-0.4999999));
        assert!(dist.invert(0.5) > 0 && dist.invert(0.5) <= dist.bound());
        assert!(dist.invert(dist.mass_zero / 2.0 + 1e-9) == 1);
    }

    #[test]
    fn gaussian_moments() {
        let sigma: f64 = 4.0;
        let dist: DiscreteGaussian = DiscreteGaussian::new(sigma);
        let mut source: Source = Source::new([0u8; 32]);
        let n: usize = 1 << 16;
        let samples: Vec<i64> = (0..n).map(|_| dist.sample(&mut source)).collect();
        let mean: f64 = samples.iter().sum::<i64>() as f64 / n as f64;
        let var: f64 = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        assert!(mean.abs() < 0.1, "mean={}", mean);
        assert!((var.sqrt() - sigma).abs() < 0.2, "std={}", var.sqrt());
        assert!(samples.iter().all(|x| x.abs() <= dist.bound()));
    }

    #[test]
    fn ternary_and_binary_ranges() {
        let mut source: Source = Source::new([3u8; 32]);
        let mut seen: [bool; 3] = [false; 3];
        (0..1024).for_each(|_| {
            let t: i64 = sample_ternary(&mut source);
            assert!((-1..=1).contains(&t));
            seen[(t + 1) as usize] = true;
            assert!(sample_binary(&mut source) <= 1);
        });
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_vectors_in_range() {
        let p: u64 = 557057;
        let mut source: Source = Source::new([5u8; 32]);
        let g: Vec<u64> = gaussian_test_vector(&mut source, 2048, p, 10.0);
        assert!(g.iter().all(|&x| x <= 128 || x >= p - 127));
        let u: Vec<u64> = uniform_test_vector(&mut source, 2048, p);
        assert!(u.iter().all(|&x| x < p));
    }
}
