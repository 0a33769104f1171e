use fv::{Ciphertext, Digits, Encryptor, Evaluator, FvError, Parameters, SecretKey};
use math::poly::{Eval, Poly};
use tracing::{debug, instrument};

use crate::error::LinalgError;
use crate::layout::{
    PackedOperator, PlainWindows, check_len, check_rectangular, check_slots, collect_rotations,
    encode_windows, encrypt_windows, next_pow2,
};

/// Folds allowed after hoisted input rotations. Rotation noise is scaled by
/// the weight digits and then roughly doubles with every fold, so layouts
/// with more folds rotate the partial products instead.
pub const MAX_INPUT_ROTATION_FOLDS: usize = 2;

/// Matrix preprocessed for products with a replicated, encrypted vector.
///
/// Rows are folded into `padded_rows` packed rows of `pack_factor` segments,
/// then stored as generalized diagonals split into plain windows.
#[derive(Clone, Debug)]
pub struct MatVec {
    rows: usize,
    cols: usize,
    pack_factor: usize,
    /// Diagonal `r` is stored pre-rotated by `-r` and the product of the
    /// input with it is rotated by `r`.
    rotate_products: bool,
    /// `diagonals[r][w]`: digit plane `w` of diagonal `r`.
    diagonals: Vec<Vec<Poly<Eval>>>,
}

impl MatVec {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn padded_rows(&self) -> usize {
        self.diagonals.len()
    }

    pub fn rotates_products(&self) -> bool {
        self.rotate_products
    }

    fn fold_rotations(&self, n: usize) -> impl Iterator<Item = usize> {
        fold_rotations(self.padded_rows(), n / self.pack_factor)
    }
}

fn fold_rotations(padded_rows: usize, end: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(padded_rows), |r| Some(r << 1)).take_while(move |&r| r < end)
}

impl PackedOperator for MatVec {
    type Input = [Ciphertext];
    type Output = Ciphertext;

    fn rotations(&self) -> Vec<usize> {
        let n: usize = self.pack_factor * next_pow2(self.cols);
        collect_rotations((1..self.padded_rows()).chain(self.fold_rotations(n)))
    }

    fn evaluate(&self, eval: &Evaluator, input: &[Ciphertext]) -> Result<Ciphertext, LinalgError> {
        mat_mul_online(eval, input, self)
    }
}

/// Replicates `vec` into every segment of `next_pow2(len)` slots and
/// encrypts one copy per window.
#[instrument(skip_all, fields(len = vec.len()))]
pub fn preprocess_vec(
    params: &Parameters,
    enc: &mut Encryptor,
    sk: &SecretKey,
    vec: &[u64],
    windows: &PlainWindows,
) -> Result<Vec<Ciphertext>, LinalgError> {
    let n: usize = params.n();
    check_slots("vector", vec.len(), n)?;
    let seg: usize = next_pow2(vec.len());
    let mut slots: Vec<u64> = vec![0u64; n];
    slots.chunks_mut(seg).for_each(|chunk| chunk[..vec.len()].copy_from_slice(vec));
    Ok(encrypt_windows(params, enc, sk, &slots, windows))
}

/// Packs and diagonalises `mat` (any number of rows up to `n`).
#[instrument(skip_all, fields(rows = mat.len()))]
pub fn preprocess_matrix(
    params: &Parameters,
    mat: &[Vec<u64>],
    windows: &PlainWindows,
) -> Result<MatVec, LinalgError> {
    let n: usize = params.n();
    let half: usize = n >> 1;
    let cols: usize = check_rectangular("matrix row", mat)?;
    check_slots("matrix rows", mat.len(), n)?;
    check_slots("matrix columns", cols, n)?;

    let cols_pow2: usize = next_pow2(cols);
    let pack_factor: usize = n / cols_pow2;
    let padded_rows: usize = (next_pow2(mat.len()) / pack_factor).max(1);

    let mut packed: Vec<Vec<u64>> = vec![vec![0u64; n]; padded_rows];
    mat.iter().enumerate().for_each(|(row, values)| {
        let offset: usize = cols_pow2 * (row / padded_rows);
        packed[row % padded_rows][offset..offset + cols].copy_from_slice(values);
    });

    let mod_mask: usize = padded_rows - 1;
    let wrap: usize = half.min(cols_pow2);
    let wrap_mask: usize = wrap - 1;
    let mut diag: Vec<Vec<u64>> = vec![vec![0u64; n]; padded_rows];
    for (row, values) in packed.iter().enumerate() {
        for (col, &x) in values.iter().enumerate() {
            let low: usize = col.wrapping_sub(row) & wrap_mask & mod_mask;
            let high: usize = (col ^ row) & half & mod_mask;
            let col_diag: usize = ((wrap * (col / wrap)) ^ high) + (col.wrapping_sub(low) & wrap_mask);
            diag[high + low][col_diag] = x;
        }
    }

    let folds: usize = fold_rotations(padded_rows, n / pack_factor).count();
    let rotate_products: bool = padded_rows > 1 && folds > MAX_INPUT_ROTATION_FOLDS;
    if rotate_products {
        // rotate(ct ⊙ rotate(d, -r), r) = rotate(ct, r) ⊙ d
        for (r, d) in diag.iter_mut().enumerate().skip(1) {
            *d = params
                .automorphism()
                .automorph_slots(d, half - r)
                .map_err(FvError::from)?;
        }
    }

    debug!(cols_pow2, pack_factor, padded_rows, folds, rotate_products, "matrix packed");
    Ok(MatVec {
        rows: mat.len(),
        cols,
        pack_factor,
        rotate_products,
        diagonals: diag
            .iter()
            .map(|d| encode_windows(params, d, windows))
            .collect(),
    })
}

/// `Σ_r rotate(ct, r) · diag_r`, then folded over the packed segments.
///
/// Input rotations are hoisted per window. Layouts with many folds rotate
/// each diagonal's product once instead.
#[instrument(skip_all, fields(padded_rows = mat.padded_rows(), rotate_products = mat.rotate_products))]
pub fn mat_mul_online(
    eval: &Evaluator,
    ct_vec: &[Ciphertext],
    mat: &MatVec,
) -> Result<Ciphertext, LinalgError> {
    let num_windows: usize = mat.diagonals.first().map_or(0, |d| d.len());
    check_len("vector windows", num_windows, ct_vec.len())?;

    let mut ret: Ciphertext = eval.zero();
    if mat.rotate_products {
        for (row, diag) in mat.diagonals.iter().enumerate() {
            let mut prod: Ciphertext = eval.zero();
            ct_vec
                .iter()
                .zip(diag)
                .for_each(|(ct, pt)| eval.mult_plain_add_inplace(ct, pt, &mut prod));
            if row > 0 {
                prod = eval.automorphism(row, &prod)?;
            }
            eval.add_inplace(&mut ret, &prod);
        }
    } else {
        for (w, ct) in ct_vec.iter().enumerate() {
            let digits: Digits = eval.hoisted_decompose(ct);
            for (row, diag) in mat.diagonals.iter().enumerate() {
                let rotated: Ciphertext = eval.automorphism_digits(row, ct, &digits)?;
                eval.mult_plain_add_inplace(&rotated, &diag[w], &mut ret);
            }
        }
    }

    for rot in mat.fold_rotations(eval.params().n()) {
        let rotated: Ciphertext = eval.automorphism(rot, &ret)?;
        eval.add_inplace(&mut ret, &rotated);
    }
    Ok(ret)
}

/// Decrypts the product and gathers the `num_rows` results.
pub fn postprocess_prod(
    params: &Parameters,
    sk: &SecretKey,
    ct_prod: &Ciphertext,
    vec_size: usize,
    num_rows: usize,
) -> Result<Vec<u64>, LinalgError> {
    let n: usize = params.n();
    check_slots("vector", vec_size, n)?;
    check_slots("matrix rows", num_rows, n)?;
    let pt: Vec<u64> = params.decrypt_decode(sk, ct_prod);
    let seg: usize = next_pow2(vec_size);
    let pack_factor: usize = n / seg;
    let set_size: usize = (next_pow2(num_rows) / pack_factor).max(1);
    Ok((0..num_rows)
        .map(|row| pt[(row % set_size) + seg * (row / set_size)])
        .collect())
}

/// `mat · vec mod p`.
pub fn mat_mul_pt(vec: &[u64], mat: &[Vec<u64>], p: u64) -> Vec<u64> {
    mat.iter()
        .map(|row| {
            row.iter()
                .zip(vec)
                .fold(0u64, |acc, (&m, &v)| (acc + m * v % p) % p)
        })
        .collect()
}
