use fv::{Ciphertext, Digits, Evaluator, Parameters};
use math::poly::{Eval, Poly};
use tracing::{debug, instrument};

use crate::error::LinalgError;
use crate::layout::{PackedOperator, PlainWindows, check_len, check_slots, collect_rotations, encode_windows};

/// How a sequence sits in the two half-ring lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conv1dStrategy {
    /// The sequence fits the first lane; one in-lane rotation per tap.
    SingleLane,
    /// The sequence spills into the second lane; every tap combines an
    /// in-lane rotation with a lane-swapped one, each under its own mask.
    CrossLane,
}

impl Conv1dStrategy {
    pub fn for_len(len: usize, n: usize) -> Self {
        if len <= n >> 1 {
            Conv1dStrategy::SingleLane
        } else {
            Conv1dStrategy::CrossLane
        }
    }
}

#[derive(Clone, Debug)]
struct Conv1dTerm {
    rot: usize,
    /// Masked tap weight, one digit plane per window.
    plains: Vec<Poly<Eval>>,
}

/// Filter preprocessed for "same" convolution of a sequence of length `len`.
#[derive(Clone, Debug)]
pub struct Filter1d {
    strategy: Conv1dStrategy,
    len: usize,
    terms: Vec<Conv1dTerm>,
}

impl Filter1d {
    pub fn strategy(&self) -> Conv1dStrategy {
        self.strategy
    }

    /// Length of the sequences this filter applies to.
    pub fn seq_len(&self) -> usize {
        self.len
    }
}

impl PackedOperator for Filter1d {
    type Input = [Ciphertext];
    type Output = Ciphertext;

    fn rotations(&self) -> Vec<usize> {
        collect_rotations(self.terms.iter().map(|t| t.rot))
    }

    fn evaluate(&self, eval: &Evaluator, input: &[Ciphertext]) -> Result<Ciphertext, LinalgError> {
        conv_1d_online(eval, input, self)
    }
}

/// Builds one masked term per non-zero tap and lane crossing. Output `y`
/// reads input `y + t - (k - 1)/2` for tap `t`, and zero outside `[0, len)`.
#[instrument(skip_all, fields(taps = filter.len(), len = len))]
pub fn preprocess_filter_1d(
    params: &Parameters,
    filter: &[u64],
    len: usize,
    windows: &PlainWindows,
) -> Result<Filter1d, LinalgError> {
    let n: usize = params.n();
    let half: usize = n >> 1;
    let p: u64 = params.p();
    check_slots("sequence", len, n)?;
    check_slots("filter", filter.len(), half)?;

    let strategy: Conv1dStrategy = Conv1dStrategy::for_len(len, n);
    let offset: isize = (filter.len() as isize - 1) / 2;
    let mut terms: Vec<Conv1dTerm> = Vec::new();
    for (tap, &weight) in filter.iter().enumerate() {
        let weight: u64 = weight % p;
        if weight == 0 {
            continue;
        }
        let shift: isize = tap as isize - offset;
        let in_lane: usize = shift.rem_euclid(half as isize) as usize;
        let lanes: &[bool] = match strategy {
            Conv1dStrategy::SingleLane => &[false],
            Conv1dStrategy::CrossLane => &[false, true],
        };
        for &swapped in lanes {
            let mut mask: Vec<u64> = vec![0u64; n];
            for (pos, m) in mask.iter_mut().enumerate().take(len) {
                let src: isize = pos as isize + shift;
                let within: isize = (pos % half) as isize + shift;
                let crosses: bool = !(0..half as isize).contains(&within);
                if (0..len as isize).contains(&src) && crosses == swapped {
                    *m = weight;
                }
            }
            if mask.iter().all(|&m| m == 0) {
                continue;
            }
            terms.push(Conv1dTerm {
                rot: if swapped { half + in_lane } else { in_lane },
                plains: encode_windows(params, &mask, windows),
            });
        }
    }

    debug!(?strategy, terms = terms.len(), "filter packed");
    Ok(Filter1d {
        strategy,
        len,
        terms,
    })
}

/// Rotated copies of every input window, indexed `[term][window]`.
#[instrument(skip_all, fields(terms = filter.terms.len()))]
pub fn conv_1d_rot(
    eval: &Evaluator,
    ct_vec: &[Ciphertext],
    filter: &Filter1d,
) -> Result<Vec<Vec<Ciphertext>>, LinalgError> {
    let mut rotated: Vec<Vec<Ciphertext>> = vec![Vec::with_capacity(ct_vec.len()); filter.terms.len()];
    for ct in ct_vec {
        let digits: Digits = eval.hoisted_decompose(ct);
        for (term, out) in filter.terms.iter().zip(rotated.iter_mut()) {
            out.push(eval.automorphism_digits(term.rot, ct, &digits)?);
        }
    }
    Ok(rotated)
}

/// `Σ_term Σ_w rotated[term][w] · plain[term][w]`.
pub fn conv_1d_mul(
    eval: &Evaluator,
    rotated: &[Vec<Ciphertext>],
    filter: &Filter1d,
) -> Result<Ciphertext, LinalgError> {
    check_len("rotated terms", filter.terms.len(), rotated.len())?;
    let mut conv: Ciphertext = eval.zero();
    for (term, cts) in filter.terms.iter().zip(rotated.iter()) {
        check_len("input windows", term.plains.len(), cts.len())?;
        cts.iter()
            .zip(term.plains.iter())
            .for_each(|(ct, pt)| eval.mult_plain_add_inplace(ct, pt, &mut conv));
    }
    Ok(conv)
}

pub fn conv_1d_online(
    eval: &Evaluator,
    ct_vec: &[Ciphertext],
    filter: &Filter1d,
) -> Result<Ciphertext, LinalgError> {
    let rotated: Vec<Vec<Ciphertext>> = conv_1d_rot(eval, ct_vec, filter)?;
    conv_1d_mul(eval, &rotated, filter)
}

/// Zero-padded "same" convolution mod p.
pub fn conv_1d_pt(vec: &[u64], filter: &[u64], p: u64) -> Vec<u64> {
    let len: isize = vec.len() as isize;
    let offset: isize = (filter.len() as isize - 1) / 2;
    (0..len)
        .map(|y| {
            filter.iter().enumerate().fold(0u64, |acc, (tap, &f)| {
                let src: isize = y + tap as isize - offset;
                if (0..len).contains(&src) {
                    (acc + vec[src as usize] * (f % p) % p) % p
                } else {
                    acc
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv::ParametersLiteral;

    #[test]
    fn terms_and_rotations() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let windows: PlainWindows = PlainWindows::covering(10, params.p()).unwrap();
        let filter: [u64; 5] = [1, 2, 3, 4, 5];

        let single: Filter1d = preprocess_filter_1d(&params, &filter, 1000, &windows).unwrap();
        assert_eq!(single.strategy(), Conv1dStrategy::SingleLane);
        assert_eq!(single.rotations(), vec![1, 2, 1022, 1023]);

        let cross: Filter1d = preprocess_filter_1d(&params, &filter, 2048, &windows).unwrap();
        assert_eq!(cross.strategy(), Conv1dStrategy::CrossLane);
        assert_eq!(
            cross.rotations(),
            vec![1, 2, 1022, 1023, 1025, 1026, 2046, 2047]
        );

        // zero taps contribute nothing
        let sparse: Filter1d = preprocess_filter_1d(&params, &[0, 7, 0], 16, &windows).unwrap();
        assert!(sparse.rotations().is_empty());
        assert!(preprocess_filter_1d(&params, &filter, 4096, &windows).is_err());
    }

    #[test]
    fn plaintext_reference() {
        assert_eq!(conv_1d_pt(&[1, 2, 3], &[1, 1, 1], 97), vec![3, 6, 5]);
        // even filters lean right: offset (4 - 1)/2 = 1
        assert_eq!(conv_1d_pt(&[1, 2, 3], &[1, 0, 0, 1], 97), vec![3, 1, 2]);
    }
}
