use fv::{Ciphertext, Encryptor, Evaluator, Parameters, SecretKey};
use math::poly::{Eval, Poly};
use math::ring::Ring;
use tracing::{debug, instrument};

use crate::error::LinalgError;
use crate::layout::{
    PackedOperator, PlainWindows, check_len, check_rectangular, collect_rotations, encode_windows,
    encrypt_windows,
};

/// Packing regime of a GEMM, fixed by the width of the client matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GemmStrategy {
    /// `rows_per_ct = n / cols_c` client rows per ciphertext; the server
    /// matrix is split into `rows_per_ct`-square blocks stored by diagonal.
    Diagonal { rows_per_ct: usize },
    /// One client row per ciphertext; each output is a scalar combination of
    /// the inputs, accumulated in 128 bits without rotations.
    FullRing,
}

impl GemmStrategy {
    pub fn for_width(cols_c: usize, n: usize) -> Result<Self, LinalgError> {
        if !cols_c.is_power_of_two() || cols_c > n {
            return Err(LinalgError::Shape(format!(
                "client matrix width {} must be a power of two up to {}",
                cols_c, n
            )));
        }
        if cols_c == n {
            Ok(GemmStrategy::FullRing)
        } else {
            Ok(GemmStrategy::Diagonal {
                rows_per_ct: n / cols_c,
            })
        }
    }

    pub fn rows_per_ct(&self) -> usize {
        match self {
            GemmStrategy::Diagonal { rows_per_ct } => *rows_per_ct,
            GemmStrategy::FullRing => 1,
        }
    }
}

#[derive(Clone, Debug)]
enum ServerPlains {
    /// `sets[set][w]`, with `set = (in_ct·out_cts + out_ct)·rows_per_ct + diagonal`.
    Diagonal(Vec<Vec<Poly<Eval>>>),
    /// `digits[out][in][w]`: digit `w` of `S[out][in]`.
    FullRing(Vec<Vec<Vec<u64>>>),
}

/// Server matrix `S` preprocessed for `S · C` against an encrypted client `C`.
#[derive(Clone, Debug)]
pub struct GemmServer {
    strategy: GemmStrategy,
    cols_c: usize,
    rows_s: usize,
    cols_s: usize,
    plains: ServerPlains,
}

impl GemmServer {
    pub fn strategy(&self) -> GemmStrategy {
        self.strategy
    }

    pub fn rows(&self) -> usize {
        self.rows_s
    }

    fn in_cts(&self) -> usize {
        self.cols_s / self.strategy.rows_per_ct()
    }

    fn out_cts(&self) -> usize {
        self.rows_s / self.strategy.rows_per_ct()
    }

    /// Rotation bringing the partial sum of diagonal `row` back into place.
    fn merge_rotation(&self, row: usize, n: usize) -> usize {
        let half: usize = n >> 1;
        let shift: usize = row * self.cols_c;
        (half & shift) + (half.wrapping_sub(shift) & (half - 1))
    }
}

impl PackedOperator for GemmServer {
    type Input = [Vec<Ciphertext>];
    type Output = Vec<Ciphertext>;

    fn rotations(&self) -> Vec<usize> {
        let n: usize = self.cols_c * self.strategy.rows_per_ct();
        collect_rotations((1..self.strategy.rows_per_ct()).map(|row| self.merge_rotation(row, n)))
    }

    fn evaluate(&self, eval: &Evaluator, input: &[Vec<Ciphertext>]) -> Result<Vec<Ciphertext>, LinalgError> {
        gemm_online(eval, input, self)
    }
}

/// Packs `rows_per_ct` client rows per ciphertext, returned as `[ct][window]`.
#[instrument(skip_all, fields(rows = mat.len()))]
pub fn preprocess_gemm_c(
    params: &Parameters,
    enc: &mut Encryptor,
    sk: &SecretKey,
    mat: &[Vec<u64>],
    windows: &PlainWindows,
) -> Result<Vec<Vec<Ciphertext>>, LinalgError> {
    let n: usize = params.n();
    let cols: usize = check_rectangular("client row", mat)?;
    let rows_per_ct: usize = GemmStrategy::for_width(cols, n)?.rows_per_ct();
    if mat.len() % rows_per_ct != 0 {
        return Err(LinalgError::Shape(format!(
            "{} client rows are not a multiple of {} rows per ciphertext",
            mat.len(),
            rows_per_ct
        )));
    }
    Ok(mat
        .chunks(rows_per_ct)
        .map(|rows| {
            let slots: Vec<u64> = rows.concat();
            encrypt_windows(params, enc, sk, &slots, windows)
        })
        .collect())
}

/// Preprocesses the server matrix `mat` (`rows_s x rows_c`) for a client
/// matrix of width `cols_c`.
#[instrument(skip_all, fields(rows = mat.len(), cols_c = cols_c))]
pub fn preprocess_gemm_s(
    params: &Parameters,
    mat: &[Vec<u64>],
    cols_c: usize,
    windows: &PlainWindows,
) -> Result<GemmServer, LinalgError> {
    let n: usize = params.n();
    let cols_s: usize = check_rectangular("server row", mat)?;
    let rows_s: usize = mat.len();
    let strategy: GemmStrategy = GemmStrategy::for_width(cols_c, n)?;
    let rows_per_ct: usize = strategy.rows_per_ct();
    if rows_s % rows_per_ct != 0 || cols_s % rows_per_ct != 0 {
        return Err(LinalgError::Shape(format!(
            "server matrix {}x{} is not tiled by {}-square blocks",
            rows_s, cols_s, rows_per_ct
        )));
    }

    let plains: ServerPlains = match strategy {
        GemmStrategy::FullRing => ServerPlains::FullRing(
            mat.iter()
                .map(|row| {
                    row.iter()
                        .map(|&x| split_scalar(x, windows))
                        .collect()
                })
                .collect(),
        ),
        GemmStrategy::Diagonal { rows_per_ct } => {
            let half_block: usize = rows_per_ct >> 1;
            let mut sets: Vec<Vec<Poly<Eval>>> = Vec::new();
            let mut diag: Vec<Vec<u64>> = vec![vec![0u64; rows_per_ct]; rows_per_ct];
            for col in (0..cols_s).step_by(rows_per_ct) {
                for row in (0..rows_s).step_by(rows_per_ct) {
                    for sub_row in 0..rows_per_ct {
                        for sub_col in 0..rows_per_ct {
                            let d: usize = (sub_row.wrapping_sub(sub_col) & half_block.wrapping_sub(1))
                                + ((sub_col ^ sub_row) & half_block);
                            diag[d][sub_col] = mat[row + sub_row][col + sub_col];
                        }
                    }
                    for d in diag.iter() {
                        let slots: Vec<u64> = d
                            .iter()
                            .flat_map(|&x| std::iter::repeat_n(x, cols_c))
                            .collect();
                        sets.push(encode_windows(params, &slots, windows));
                    }
                }
            }
            ServerPlains::Diagonal(sets)
        }
    };

    debug!(?strategy, rows_s, cols_s, "server matrix packed");
    Ok(GemmServer {
        strategy,
        cols_c,
        rows_s,
        cols_s,
        plains,
    })
}

fn split_scalar(x: u64, windows: &PlainWindows) -> Vec<u64> {
    let mask: u64 = (1 << windows.window_size) - 1;
    (0..windows.num_windows)
        .map(|w| {
            let shift: usize = w * windows.window_size;
            if shift >= 64 { 0 } else { (x >> shift) & mask }
        })
        .collect()
}

/// `S · C` for either strategy; one ciphertext per `rows_per_ct` output rows.
#[instrument(skip_all, fields(strategy = ?server.strategy))]
pub fn gemm_online(
    eval: &Evaluator,
    ct_mat: &[Vec<Ciphertext>],
    server: &GemmServer,
) -> Result<Vec<Ciphertext>, LinalgError> {
    check_len("client ciphertexts", server.in_cts(), ct_mat.len())?;
    let sets: &[Vec<Poly<Eval>>] = match &server.plains {
        ServerPlains::FullRing(_) => return gemm_phim_online(eval, ct_mat, server),
        ServerPlains::Diagonal(sets) => sets,
    };

    let n: usize = eval.params().n();
    let rows_per_ct: usize = server.strategy.rows_per_ct();
    let out_cts: usize = server.out_cts();
    let mut psum: Vec<Ciphertext> = vec![eval.zero(); out_cts * rows_per_ct];
    for (in_ct, windows) in ct_mat.iter().enumerate() {
        for (w, ct) in windows.iter().enumerate() {
            let base: usize = in_ct * out_cts * rows_per_ct;
            for (dest, acc) in psum.iter_mut().enumerate() {
                let plains: &[Poly<Eval>] = &sets[base + dest];
                check_len("server windows", plains.len(), windows.len())?;
                eval.mult_plain_add_inplace(ct, &plains[w], acc);
            }
        }
    }

    psum.chunks(rows_per_ct)
        .map(|rows| -> Result<Ciphertext, LinalgError> {
            let mut ret: Ciphertext = rows[0].clone();
            for (row, ct) in rows.iter().enumerate().skip(1) {
                let rotated: Ciphertext = eval.automorphism(server.merge_rotation(row, n), ct)?;
                eval.add_inplace(&mut ret, &rotated);
            }
            Ok(ret)
        })
        .collect()
}

/// Full-ring GEMM: every output row is `Σ_in S[out][in] · C[in]`, each scalar
/// applied digit by digit and accumulated in 128 bits.
#[instrument(skip_all)]
pub fn gemm_phim_online(
    eval: &Evaluator,
    ct_mat: &[Vec<Ciphertext>],
    server: &GemmServer,
) -> Result<Vec<Ciphertext>, LinalgError> {
    let ServerPlains::FullRing(digits) = &server.plains else {
        return Err(LinalgError::Shape(
            "full-ring evaluation needs a client matrix of full width".to_string(),
        ));
    };
    check_len("client ciphertexts", server.cols_s, ct_mat.len())?;

    let ring: &Ring = eval.params().ring_q();
    let n: usize = ring.n();
    digits
        .iter()
        .map(|row| -> Result<Ciphertext, LinalgError> {
            let mut a: Vec<u128> = vec![0u128; n];
            let mut b: Vec<u128> = vec![0u128; n];
            for (windows, coeffs) in ct_mat.iter().zip(row.iter()) {
                check_len("client windows", coeffs.len(), windows.len())?;
                for (ct, &c) in windows.iter().zip(coeffs.iter()) {
                    if c == 0 {
                        continue;
                    }
                    accumulate(&mut a, ct.a.as_slice(), c);
                    accumulate(&mut b, ct.b.as_slice(), c);
                }
            }
            Ok(Ciphertext {
                a: reduce(ring, a),
                b: reduce(ring, b),
            })
        })
        .collect()
}

fn accumulate(acc: &mut [u128], x: &[u64], c: u64) {
    acc.iter_mut()
        .zip(x.iter())
        .for_each(|(acc, &x)| *acc += x as u128 * c as u128);
}

fn reduce(ring: &Ring, acc: Vec<u128>) -> Poly<Eval> {
    Poly::from_vec(acc.into_iter().map(|x| ring.modulus.reduce_u128(x)).collect())
}

/// Decrypts `S · C` back into `num_rows x num_cols`.
pub fn postprocess_gemm(
    params: &Parameters,
    sk: &SecretKey,
    ct_prod: &[Ciphertext],
    num_rows: usize,
    num_cols: usize,
) -> Result<Vec<Vec<u64>>, LinalgError> {
    let rows_per_ct: usize = GemmStrategy::for_width(num_cols, params.n())?.rows_per_ct();
    Ok(ct_prod
        .iter()
        .flat_map(|ct| {
            let pt: Vec<u64> = params.decrypt_decode(sk, ct);
            (0..rows_per_ct)
                .map(|row| pt[row * num_cols..(row + 1) * num_cols].to_vec())
                .collect::<Vec<_>>()
        })
        .take(num_rows)
        .collect())
}

/// `S · C mod p` for `S` of shape `rows_s x rows_c` and `C` of `rows_c x cols_c`.
pub fn gemm_pt(mat_c: &[Vec<u64>], mat_s: &[Vec<u64>], p: u64) -> Vec<Vec<u64>> {
    let cols_c: usize = mat_c.first().map_or(0, |r| r.len());
    mat_s
        .iter()
        .map(|s_row| {
            (0..cols_c)
                .map(|col| {
                    s_row
                        .iter()
                        .zip(mat_c.iter())
                        .fold(0u64, |acc, (&s, c_row)| (acc + s * c_row[col] % p) % p)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv::ParametersLiteral;

    #[test]
    fn strategy_selection() {
        assert_eq!(
            GemmStrategy::for_width(128, 2048).unwrap(),
            GemmStrategy::Diagonal { rows_per_ct: 16 }
        );
        assert_eq!(GemmStrategy::for_width(2048, 2048).unwrap(), GemmStrategy::FullRing);
        assert!(GemmStrategy::for_width(100, 2048).is_err());
        assert!(GemmStrategy::for_width(4096, 2048).is_err());
        assert!(GemmStrategy::for_width(0, 2048).is_err());
    }

    #[test]
    fn postprocess_shape_errors() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let sk: SecretKey = fv::KeyGenerator::with_seed([2u8; 32]).gen_secret_key(&params);
        let cts: Vec<Ciphertext> = vec![Evaluator::new(&params).zero(); 2];
        for cols in [0, 3, 4096] {
            assert!(matches!(
                postprocess_gemm(&params, &sk, &cts, 1, cols),
                Err(LinalgError::Shape(_))
            ));
        }
        // full-ring results hold one row per ciphertext
        assert_eq!(
            postprocess_gemm(&params, &sk, &cts, 2, 2048).unwrap(),
            vec![vec![0u64; 2048]; 2]
        );
        assert_eq!(postprocess_gemm(&params, &sk, &cts, 3, 1024).unwrap().len(), 3);
    }

    #[test]
    fn merge_rotations() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let windows: PlainWindows = PlainWindows::covering(20, params.p()).unwrap();
        let server: GemmServer =
            preprocess_gemm_s(&params, &vec![vec![1u64; 4]; 4], 512, &windows).unwrap();
        // rows 1..3 shifted by 512 within a lane, or across lanes
        assert_eq!(server.rotations(), vec![512, 1024, 1536]);
        assert!(preprocess_gemm_s(&params, &vec![vec![1u64; 4]; 3], 512, &windows).is_err());
    }

    #[test]
    fn scalar_digits() {
        let windows: PlainWindows = PlainWindows::covering(10, 557057).unwrap();
        assert_eq!(split_scalar(557056, &windows), vec![557056 & 1023, 557056 >> 10]);
        assert_eq!(gemm_pt(&[vec![1, 2], vec![3, 4]], &[vec![1, 1]], 5), vec![vec![4, 1]]);
    }
}
