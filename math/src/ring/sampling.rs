use rand_distr::Distribution;
use sampling::Source;
use sampling::distributions::{DiscreteGaussian, sample_binary, sample_ternary, signed_to_mod};

use crate::modulus::WordOps;
use crate::poly::{Coeff, Poly};
use crate::ring::Ring;

impl Ring {
    /// Uniform coefficients in `[0, q)`, by rejection.
    pub fn fill_uniform<R>(&self, source: &mut Source, a: &mut Poly<R>) {
        let max: u64 = self.q();
        let mask: u64 = max.mask();
        a.0.iter_mut().for_each(|a| *a = source.next_u64n(max, mask));
    }

    /// Coefficients uniform in `{-1, 0, 1}`, represented in `[0, q)`.
    pub fn fill_ternary(&self, source: &mut Source, a: &mut Poly<Coeff>) {
        let q: u64 = self.q();
        a.0.iter_mut()
            .for_each(|a| *a = signed_to_mod(sample_ternary(source), q));
    }

    pub fn fill_binary(&self, source: &mut Source, a: &mut Poly<Coeff>) {
        a.0.iter_mut().for_each(|a| *a = sample_binary(source));
    }

    pub fn fill_gaussian(&self, dist: &DiscreteGaussian, source: &mut Source, a: &mut Poly<Coeff>) {
        let q: u64 = self.q();
        a.0.iter_mut()
            .for_each(|a| *a = signed_to_mod(dist.sample(source), q));
    }
}

#[cfg(test)]
mod tests {
    use crate::modulus::Modulus;
    use crate::modulus::fast::{LOG_N, PSI_Q, Q};
    use crate::poly::{Coeff, Poly};
    use crate::ring::Ring;
    use sampling::{DiscreteGaussian, Source};

    #[test]
    fn fills_respect_supports() {
        let ring: Ring = Ring::new(LOG_N, Modulus::FastQ, PSI_Q).unwrap();
        let mut source: Source = Source::new([0u8; 32]);
        let mut a: Poly<Coeff> = ring.new_poly();

        ring.fill_uniform(&mut source, &mut a);
        assert!(a.0.iter().all(|&x| x < Q));
        assert!(a.0.iter().any(|&x| x > Q >> 1));

        ring.fill_ternary(&mut source, &mut a);
        assert!(a.0.iter().all(|&x| x <= 1 || x == Q - 1));

        ring.fill_binary(&mut source, &mut a);
        assert!(a.0.iter().all(|&x| x <= 1));

        let dist: DiscreteGaussian = DiscreteGaussian::new(4.0);
        let bound: u64 = dist.bound() as u64;
        ring.fill_gaussian(&dist, &mut source, &mut a);
        assert!(a.0.iter().all(|&x| x <= bound || x >= Q - bound));
    }
}
