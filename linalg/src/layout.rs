use std::collections::BTreeSet;

use fv::{Ciphertext, Encryptor, Evaluator, Parameters, SecretKey};
use math::poly::{Coeff, Eval, Poly};
use math::ring::Ring;

use crate::error::LinalgError;

/// Smallest power of two `>= x`, with `next_pow2(0) = 1`.
pub fn next_pow2(x: usize) -> usize {
    x.max(1).next_power_of_two()
}

/// Base-`2^window_size` split of plaintext-side weights.
///
/// Inputs are encrypted once per window, scaled by `2^(w·window_size)`, and
/// weights are cut into digit planes below `2^window_size`. Products of a
/// scaled input with a digit plane then sum to the full product while each
/// term carries only a small multiplicand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlainWindows {
    pub window_size: usize,
    pub num_windows: usize,
}

impl PlainWindows {
    /// Fails unless the windows cover every residue mod `p`.
    pub fn new(window_size: usize, num_windows: usize, p: u64) -> Result<Self, LinalgError> {
        if !(1..64).contains(&window_size) || num_windows == 0 {
            return Err(LinalgError::Shape(format!(
                "plain windows {}x{} must have 1 <= size <= 63 and at least one window",
                window_size, num_windows
            )));
        }
        let bits: usize = residue_bits(p);
        if window_size * num_windows < bits {
            return Err(LinalgError::Shape(format!(
                "plain windows {}x{} cover fewer than the {} bits of p={}",
                window_size, num_windows, bits, p
            )));
        }
        Ok(Self {
            window_size,
            num_windows,
        })
    }

    /// Fewest windows of `window_size` bits covering residues mod `p`.
    pub fn covering(window_size: usize, p: u64) -> Result<Self, LinalgError> {
        Self::new(window_size, residue_bits(p).div_ceil(window_size.max(1)), p)
    }

    /// `2^(w·window_size) mod p`.
    pub(crate) fn scale(&self, w: usize, ring_p: &Ring) -> u64 {
        ring_p.modulus.pow(2, (w * self.window_size) as u64)
    }
}

fn residue_bits(p: u64) -> usize {
    (u64::BITS - (p - 1).leading_zeros()) as usize
}

/// A packed linear operator with its plaintext operands preprocessed.
///
/// The shape regime is fixed when the operator is built; evaluation only
/// needs an evaluator holding every key listed by [`PackedOperator::rotations`].
pub trait PackedOperator {
    type Input: ?Sized;
    type Output;

    /// Rotation keys required by [`PackedOperator::evaluate`], ascending, without 0.
    fn rotations(&self) -> Vec<usize>;

    fn evaluate(&self, eval: &Evaluator, input: &Self::Input) -> Result<Self::Output, LinalgError>;
}

/// Encodes `slots` and encrypts one scaled copy per plain window.
pub fn encrypt_windows(
    params: &Parameters,
    enc: &mut Encryptor,
    sk: &SecretKey,
    slots: &[u64],
    windows: &PlainWindows,
) -> Vec<Ciphertext> {
    let ring_p: &Ring = params.ring_p();
    let pt: Poly<Coeff> = params.encode(slots);
    (0..windows.num_windows)
        .map(|w| {
            let mut scaled: Poly<Coeff> = pt.clone();
            ring_p.mul_scalar_inplace(&mut scaled, windows.scale(w, ring_p));
            enc.encrypt_sk(params, sk, &scaled)
        })
        .collect()
}

/// Encodes `slots` and splits the plaintext into null-encrypted digit planes.
pub fn encode_windows(params: &Parameters, slots: &[u64], windows: &PlainWindows) -> Vec<Poly<Eval>> {
    balanced_digits(&params.encode(slots), params.p(), params.q(), windows)
        .iter()
        .map(|digit| params.null_encrypt(digit))
        .collect()
}

/// Signed digits of the coefficients of `pt` centred mod `p`, lifted to `[0, q)`.
///
/// Every plane but the last holds digits in `[-2^(w-1), 2^(w-1))`; the last
/// takes the remaining carry.
fn balanced_digits(pt: &Poly<Coeff>, p: u64, q: u64, windows: &PlainWindows) -> Vec<Poly<Coeff>> {
    let (size, count) = (windows.window_size, windows.num_windows);
    let half: i128 = 1 << (size - 1);
    let mask: i128 = (1 << size) - 1;
    let mut planes: Vec<Vec<u64>> = vec![vec![0u64; pt.n()]; count];
    for (i, &x) in pt.0.iter().enumerate() {
        let x: u64 = x % p;
        let mut c: i128 = if x > p >> 1 { x as i128 - p as i128 } else { x as i128 };
        for (w, plane) in planes.iter_mut().enumerate() {
            let d: i128 = if w + 1 == count { c } else { ((c + half) & mask) - half };
            c = (c - d) >> size;
            plane[i] = if d < 0 { q - d.unsigned_abs() as u64 } else { d as u64 };
        }
    }
    planes.into_iter().map(Poly::from_vec).collect()
}

/// Encrypted and decoded vectors must both fit in a ring element.
pub(crate) fn check_slots(what: &'static str, len: usize, n: usize) -> Result<(), LinalgError> {
    if len == 0 || len > n {
        return Err(LinalgError::Shape(format!(
            "{} of length {} does not fit {} slots",
            what, len, n
        )));
    }
    Ok(())
}

pub(crate) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), LinalgError> {
    if expected != got {
        return Err(LinalgError::Dimension {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

/// Rows of a matrix must share one length; returns it.
pub(crate) fn check_rectangular(what: &'static str, rows: &[Vec<u64>]) -> Result<usize, LinalgError> {
    let cols: usize = rows.first().map_or(0, |r| r.len());
    if rows.is_empty() || cols == 0 {
        return Err(LinalgError::Shape(format!("{} is empty", what)));
    }
    rows.iter().try_for_each(|r| check_len(what, cols, r.len()))?;
    Ok(cols)
}

/// Distinct non-zero rotations, ascending.
pub(crate) fn collect_rotations<I: IntoIterator<Item = usize>>(rots: I) -> Vec<usize> {
    rots.into_iter()
        .filter(|&r| r != 0)
        .collect::<BTreeSet<usize>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv::{KeyGenerator, ParametersLiteral};

    #[test]
    fn window_coverage() {
        let p: u64 = 557057;
        assert_eq!(PlainWindows::covering(10, p).unwrap().num_windows, 2);
        assert_eq!(PlainWindows::covering(8, p).unwrap().num_windows, 3);
        assert_eq!(PlainWindows::covering(20, p).unwrap().num_windows, 1);
        assert!(PlainWindows::new(9, 2, p).is_err());
        assert!(PlainWindows::new(0, 2, p).is_err());
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(784), 1024);
        assert_eq!(collect_rotations([3, 0, 1, 3]), vec![1, 3]);
    }

    #[test]
    fn balanced_planes() {
        let (p, q): (u64, u64) = (557057, 1 << 40);
        let windows: PlainWindows = PlainWindows::covering(10, p).unwrap();
        let pt: Poly<Coeff> = Poly::from_vec(vec![0, 1, 511, 512, 1023, p / 2, p / 2 + 1, p - 1]);
        let planes: Vec<Poly<Coeff>> = balanced_digits(&pt, p, q, &windows);
        assert_eq!(planes.len(), 2);
        let signed = |x: u64| -> i128 { if x > q >> 1 { x as i128 - q as i128 } else { x as i128 } };
        for (i, &x) in pt.0.iter().enumerate() {
            let low: i128 = signed(planes[0].0[i]);
            let high: i128 = signed(planes[1].0[i]);
            assert!((-512..512).contains(&low), "x={} low={}", x, low);
            assert_eq!((low + (high << 10)).rem_euclid(p as i128), x as i128, "x={}", x);
        }
        // p - 1 is -1 once centred
        assert_eq!(planes[0].0[7], q - 1);
        assert_eq!(planes[1].0[7], 0);
        // 512 carries into the next window
        assert_eq!(signed(planes[0].0[3]), -512);
        assert_eq!(planes[1].0[3], 1);

        let single: Vec<Poly<Coeff>> = balanced_digits(&pt, p, q, &PlainWindows::covering(20, p).unwrap());
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].0[6], q - p / 2);
    }

    #[test]
    fn windows_recombine() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let p: u64 = params.p();
        let windows: PlainWindows = PlainWindows::covering(10, p).unwrap();
        let sk: SecretKey = KeyGenerator::with_seed([3u8; 32]).gen_secret_key(&params);
        let mut enc: Encryptor = Encryptor::with_seed([4u8; 32]);
        let x: Vec<u64> = (0..2048u64).map(|i| (i * 7919) % p).collect();
        let y: Vec<u64> = (0..2048u64).map(|i| (p - 1 - i * 13) % p).collect();

        let cts: Vec<Ciphertext> = encrypt_windows(&params, &mut enc, &sk, &x, &windows);
        let planes: Vec<Poly<Eval>> = encode_windows(&params, &y, &windows);
        let eval: Evaluator = Evaluator::new(&params);
        let mut acc: Ciphertext = eval.zero();
        cts.iter()
            .zip(planes.iter())
            .for_each(|(ct, pt)| eval.mult_plain_add_inplace(ct, pt, &mut acc));

        let want: Vec<u64> = x.iter().zip(&y).map(|(a, b)| a * b % p).collect();
        assert_eq!(params.decrypt_decode(&sk, &acc), want);
    }
}
