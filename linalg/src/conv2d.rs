use std::collections::BTreeMap;

use fv::{Ciphertext, Digits, Encryptor, Evaluator, Parameters, SecretKey};
use math::poly::{Eval, Poly};
use tracing::{debug, instrument};

use crate::error::LinalgError;
use crate::layers::{Activations, ConvShape, Filter2d};
use crate::layout::{
    PackedOperator, PlainWindows, check_len, collect_rotations, encode_windows, encrypt_windows,
    next_pow2,
};

/// Placement of a feature map in ciphertext slots, fixed by its height and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tiling {
    /// Each channel padded to `chn_pow2 <= n/2` slots, `per_ct` channels per
    /// ciphertext.
    Channel { chn_pow2: usize, per_ct: usize },
    /// Two channels per ciphertext, one per lane. Each lane holds
    /// `rows_per_lane` rows of `row_pow2` slots; row `h` lives in ciphertext
    /// `h % cts_per_chn` of its channel pair.
    Row {
        row_pow2: usize,
        rows_per_lane: usize,
        cts_per_chn: usize,
    },
}

impl Tiling {
    pub fn for_shape(shape: &ConvShape, n: usize) -> Result<Self, LinalgError> {
        let half: usize = n >> 1;
        if shape.chn == 0 || shape.h == 0 || shape.w == 0 {
            return Err(LinalgError::Shape(format!("empty feature map {:?}", shape)));
        }
        let row_pow2: usize = next_pow2(shape.w);
        if row_pow2 > half {
            return Err(LinalgError::Shape(format!(
                "rows of width {} are larger than half a ciphertext",
                shape.w
            )));
        }
        let chn_pow2: usize = next_pow2(shape.pixels());
        if chn_pow2 <= half {
            return Ok(Tiling::Channel {
                chn_pow2,
                per_ct: n / chn_pow2,
            });
        }
        let rows_per_lane: usize = half / row_pow2;
        Ok(Tiling::Row {
            row_pow2,
            rows_per_lane,
            cts_per_chn: shape.h.div_ceil(rows_per_lane),
        })
    }

    pub fn num_cts(&self, chn: usize) -> usize {
        match *self {
            Tiling::Channel { per_ct, .. } => chn.div_ceil(per_ct),
            Tiling::Row { cts_per_chn, .. } => chn.div_ceil(2) * cts_per_chn,
        }
    }

    /// Ciphertext index and slot of pixel `(c, h, w)` in a map of width `width`.
    fn locate(&self, c: usize, h: usize, w: usize, width: usize, n: usize) -> (usize, usize) {
        match *self {
            Tiling::Channel { chn_pow2, per_ct } => {
                (c / per_ct, (c % per_ct) * chn_pow2 + h * width + w)
            }
            Tiling::Row {
                row_pow2,
                cts_per_chn,
                ..
            } => (
                (c / 2) * cts_per_chn + h % cts_per_chn,
                (c % 2) * (n >> 1) + (h / cts_per_chn) * row_pow2 + w,
            ),
        }
    }

    fn pack(&self, act: &Activations, n: usize) -> Vec<Vec<u64>> {
        let shape: ConvShape = act.shape;
        let mut slots: Vec<Vec<u64>> = vec![vec![0u64; n]; self.num_cts(shape.chn)];
        for (c, rows) in act.act.iter().enumerate() {
            for (h, row) in rows.iter().enumerate() {
                for (w, &x) in row.iter().enumerate() {
                    let (ct, pos) = self.locate(c, h, w, shape.w, n);
                    slots[ct][pos] = x;
                }
            }
        }
        slots
    }

    fn unpack(&self, slots: &[Vec<u64>], shape: ConvShape, n: usize) -> Activations {
        let mut out: Activations = Activations::new(shape);
        for (c, rows) in out.act.iter_mut().enumerate() {
            for (h, row) in rows.iter_mut().enumerate() {
                for (w, x) in row.iter_mut().enumerate() {
                    let (ct, pos) = self.locate(c, h, w, shape.w, n);
                    *x = slots[ct][pos];
                }
            }
        }
        out
    }
}

/// Evaluation schedule of a 2-D convolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conv2dStrategy {
    /// Channel tiling; input rotations cover every channel pairing.
    ChannelOneStage,
    /// Channel tiling; shared tap rotations, then one rotation per pairing
    /// on the partial sums.
    ChannelTwoStage,
    /// Row tiling; tap rotations, then one lane swap per output ciphertext.
    RowTiled,
}

#[derive(Clone, Debug)]
struct Product {
    dest: usize,
    plains: Vec<Poly<Eval>>,
}

#[derive(Clone, Debug)]
struct RotationGroup {
    rot: usize,
    products: Vec<Product>,
}

/// Filter preprocessed for a given input shape.
#[derive(Clone, Debug)]
pub struct Conv2dFilter {
    strategy: Conv2dStrategy,
    tiling: Tiling,
    in_shape: ConvShape,
    out_shape: ConvShape,
    num_windows: usize,
    /// Rotations and products applied to each input ciphertext.
    groups: Vec<Vec<RotationGroup>>,
    num_mid: usize,
    /// `delta·encode(bias)` per output ciphertext.
    bias: Option<Vec<Poly<Eval>>>,
}

impl Conv2dFilter {
    pub fn strategy(&self) -> Conv2dStrategy {
        self.strategy
    }

    pub fn tiling(&self) -> Tiling {
        self.tiling
    }

    pub fn in_shape(&self) -> ConvShape {
        self.in_shape
    }

    pub fn out_shape(&self) -> ConvShape {
        self.out_shape
    }

    fn merge_rotations(&self, n: usize) -> Vec<usize> {
        let half: usize = n >> 1;
        match (self.strategy, self.tiling) {
            (Conv2dStrategy::ChannelTwoStage, Tiling::Channel { chn_pow2, per_ct }) => (1..per_ct)
                .map(|lp| {
                    let base: usize = lp * chn_pow2;
                    (base & half) + (half.wrapping_sub(base) & (half - 1))
                })
                .collect(),
            (Conv2dStrategy::RowTiled, _) => vec![half],
            _ => Vec::new(),
        }
    }

    fn ring_degree(&self) -> usize {
        match self.tiling {
            Tiling::Channel { chn_pow2, per_ct } => chn_pow2 * per_ct,
            Tiling::Row {
                row_pow2,
                rows_per_lane,
                ..
            } => 2 * row_pow2 * rows_per_lane,
        }
    }
}

impl PackedOperator for Conv2dFilter {
    type Input = [Vec<Ciphertext>];
    type Output = Vec<Ciphertext>;

    fn rotations(&self) -> Vec<usize> {
        let n: usize = self.ring_degree();
        collect_rotations(
            self.groups
                .iter()
                .flatten()
                .map(|g| g.rot)
                .chain(self.merge_rotations(n)),
        )
    }

    fn evaluate(&self, eval: &Evaluator, input: &[Vec<Ciphertext>]) -> Result<Vec<Ciphertext>, LinalgError> {
        match self.strategy {
            Conv2dStrategy::ChannelOneStage => conv_2d_online(eval, input, self),
            _ => conv_2d_2stage_online(eval, input, self),
        }
    }
}

/// Packs and encrypts a feature map, returned as `[ct][window]`.
#[instrument(skip_all, fields(shape = ?input.shape))]
pub fn preprocess_ifmap(
    params: &Parameters,
    enc: &mut Encryptor,
    sk: &SecretKey,
    input: &Activations,
    windows: &PlainWindows,
) -> Result<Vec<Vec<Ciphertext>>, LinalgError> {
    let n: usize = params.n();
    let tiling: Tiling = Tiling::for_shape(&input.shape, n)?;
    check_activations(input)?;
    debug!(?tiling, "feature map packed");
    Ok(tiling
        .pack(input, n)
        .iter()
        .map(|slots| encrypt_windows(params, enc, sk, slots, windows))
        .collect())
}

/// One-stage preprocessing; only channel-tiled shapes support it.
#[instrument(skip_all, fields(filter = ?filter.shape))]
pub fn preprocess_filter(
    params: &Parameters,
    filter: &Filter2d,
    shape: &ConvShape,
    windows: &PlainWindows,
) -> Result<Conv2dFilter, LinalgError> {
    let tiling: Tiling = Tiling::for_shape(shape, params.n())?;
    if let Tiling::Row { .. } = tiling {
        return Err(LinalgError::Shape(
            "row-tiled feature maps need the two-stage convolution".to_string(),
        ));
    }
    build_filter(params, filter, shape, windows, Conv2dStrategy::ChannelOneStage, tiling)
}

/// Two-stage preprocessing, channel- or row-tiled depending on the shape.
#[instrument(skip_all, fields(filter = ?filter.shape))]
pub fn preprocess_filter_2stage(
    params: &Parameters,
    filter: &Filter2d,
    shape: &ConvShape,
    windows: &PlainWindows,
) -> Result<Conv2dFilter, LinalgError> {
    let tiling: Tiling = Tiling::for_shape(shape, params.n())?;
    let strategy: Conv2dStrategy = match tiling {
        Tiling::Channel { .. } => Conv2dStrategy::ChannelTwoStage,
        Tiling::Row { .. } => Conv2dStrategy::RowTiled,
    };
    build_filter(params, filter, shape, windows, strategy, tiling)
}

fn check_activations(input: &Activations) -> Result<(), LinalgError> {
    let shape: ConvShape = input.shape;
    check_len("activation channels", shape.chn, input.act.len())?;
    for rows in input.act.iter() {
        check_len("activation rows", shape.h, rows.len())?;
        rows.iter()
            .try_for_each(|row| check_len("activation columns", shape.w, row.len()))?;
    }
    Ok(())
}

fn check_filter(filter: &Filter2d, shape: &ConvShape) -> Result<(), LinalgError> {
    let fs = filter.shape;
    if fs.f_h == 0 || fs.f_w == 0 || fs.out_chn == 0 {
        return Err(LinalgError::Shape(format!("empty filter {:?}", fs)));
    }
    check_len("filter input channels", shape.chn, fs.in_chn)?;
    check_len("filter output channels", fs.out_chn, filter.w.len())?;
    check_len("bias", fs.out_chn, filter.b.len())?;
    for per_in in filter.w.iter() {
        check_len("filter input channels", fs.in_chn, per_in.len())?;
        for rows in per_in.iter() {
            check_len("filter rows", fs.f_h, rows.len())?;
            rows.iter()
                .try_for_each(|row| check_len("filter columns", fs.f_w, row.len()))?;
        }
    }
    Ok(())
}

/// Collects masked diagonals by input ciphertext and rotation.
struct FilterBuilder<'a> {
    params: &'a Parameters,
    windows: &'a PlainWindows,
    groups: Vec<BTreeMap<usize, Vec<Product>>>,
}

impl FilterBuilder<'_> {
    fn push(&mut self, in_ct: usize, rot: usize, dest: usize, slots: &[u64]) {
        if slots.iter().all(|&x| x == 0) {
            return;
        }
        let plains: Vec<Poly<Eval>> = encode_windows(self.params, slots, self.windows);
        self.groups[in_ct]
            .entry(rot)
            .or_default()
            .push(Product { dest, plains });
    }

    fn finish(self) -> Vec<Vec<RotationGroup>> {
        self.groups
            .into_iter()
            .map(|groups| {
                groups
                    .into_iter()
                    .map(|(rot, products)| RotationGroup { rot, products })
                    .collect()
            })
            .collect()
    }
}

fn build_filter(
    params: &Parameters,
    filter: &Filter2d,
    shape: &ConvShape,
    windows: &PlainWindows,
    strategy: Conv2dStrategy,
    tiling: Tiling,
) -> Result<Conv2dFilter, LinalgError> {
    check_filter(filter, shape)?;
    let n: usize = params.n();
    let out_shape: ConvShape = ConvShape::new(filter.shape.out_chn, shape.h, shape.w);
    let mut builder: FilterBuilder = FilterBuilder {
        params,
        windows,
        groups: vec![BTreeMap::new(); tiling.num_cts(shape.chn)],
    };

    let num_mid: usize = match tiling {
        Tiling::Channel { chn_pow2, per_ct } => {
            channel_diagonals(&mut builder, filter, shape, strategy, chn_pow2, per_ct, n)
        }
        Tiling::Row {
            row_pow2,
            rows_per_lane,
            cts_per_chn,
        } => row_diagonals(&mut builder, filter, shape, row_pow2, rows_per_lane, cts_per_chn, n),
    };

    let bias: Option<Vec<Poly<Eval>>> = filter.has_bias().then(|| {
        let mut act: Activations = Activations::new(out_shape);
        act.act
            .iter_mut()
            .zip(filter.b.iter())
            .for_each(|(rows, &b)| rows.iter_mut().flatten().for_each(|x| *x = b));
        tiling
            .pack(&act, n)
            .iter()
            .map(|slots| params.encode_scaled(slots))
            .collect()
    });

    let groups: Vec<Vec<RotationGroup>> = builder.finish();
    debug!(
        ?strategy,
        ?tiling,
        rotations = groups.iter().map(|g| g.len()).sum::<usize>(),
        num_mid,
        "filter packed"
    );
    Ok(Conv2dFilter {
        strategy,
        tiling,
        in_shape: *shape,
        out_shape,
        num_windows: windows.num_windows,
        groups,
        num_mid,
        bias,
    })
}

/// Slot vector of tap `(a, b)` for channel-tiled maps: segment `off` pairs
/// input channel `in_base + din` with output channel `out_base + dout`.
#[allow(clippy::too_many_arguments)]
fn channel_diagonal<F: Fn(usize) -> (usize, usize)>(
    filter: &Filter2d,
    shape: &ConvShape,
    chn_pow2: usize,
    per_ct: usize,
    (in_base, out_base): (usize, usize),
    (a, b): (usize, usize),
    pairing: F,
    n: usize,
) -> Vec<u64> {
    let (off_h, off_w) = filter.shape.offset();
    let mut slots: Vec<u64> = vec![0u64; n];
    for off in 0..per_ct {
        let (din, dout) = pairing(off);
        let (ci, co) = (in_base + din, out_base + dout);
        if ci >= shape.chn || co >= filter.shape.out_chn {
            continue;
        }
        let coeff: u64 = filter.w[co][ci][a][b];
        for h in 0..shape.h {
            for w in 0..shape.w {
                if (h + a).checked_sub(off_h).is_some_and(|t| t < shape.h)
                    && (w + b).checked_sub(off_w).is_some_and(|t| t < shape.w)
                {
                    slots[off * chn_pow2 + h * shape.w + w] = coeff;
                }
            }
        }
    }
    slots
}

fn channel_diagonals(
    builder: &mut FilterBuilder,
    filter: &Filter2d,
    shape: &ConvShape,
    strategy: Conv2dStrategy,
    chn_pow2: usize,
    per_ct: usize,
    n: usize,
) -> usize {
    let half: usize = n >> 1;
    let seg: usize = per_ct >> 1;
    let (off_h, off_w) = filter.shape.offset();
    let in_cts: usize = shape.chn.div_ceil(per_ct);
    let out_cts: usize = filter.shape.out_chn.div_ceil(per_ct);
    // input segment read by output segment `off` on pairing `lp`
    let mix = |off: usize, lp: usize| ((off + lp) % seg + (lp / seg) * seg + (off / seg) * seg) % per_ct;
    let shift = |a: usize, b: usize| -> isize {
        (a as isize - off_h as isize) * shape.w as isize + (b as isize - off_w as isize)
    };

    for in_ct in 0..in_cts {
        for a in 0..filter.shape.f_h {
            for b in 0..filter.shape.f_w {
                for out_ct in 0..out_cts {
                    let bases: (usize, usize) = (in_ct * per_ct, out_ct * per_ct);
                    for lp in 0..per_ct {
                        match strategy {
                            Conv2dStrategy::ChannelOneStage => {
                                let base: usize = lp * chn_pow2;
                                let rot: usize = (base & half)
                                    + (base.wrapping_add_signed(shift(a, b)) & (half - 1));
                                let slots: Vec<u64> = channel_diagonal(
                                    filter, shape, chn_pow2, per_ct, bases, (a, b),
                                    |off| (mix(off, lp), off),
                                    n,
                                );
                                builder.push(in_ct, rot, out_ct, &slots);
                            }
                            _ => {
                                let rot: usize = (shift(a, b) as usize) & (half - 1);
                                let slots: Vec<u64> = channel_diagonal(
                                    filter, shape, chn_pow2, per_ct, bases, (a, b),
                                    |off| (off, mix(off, lp)),
                                    n,
                                );
                                builder.push(in_ct, rot, out_ct * per_ct + lp, &slots);
                            }
                        }
                    }
                }
            }
        }
    }

    match strategy {
        Conv2dStrategy::ChannelOneStage => out_cts,
        _ => out_cts * per_ct,
    }
}

#[allow(clippy::too_many_arguments)]
fn row_diagonals(
    builder: &mut FilterBuilder,
    filter: &Filter2d,
    shape: &ConvShape,
    row_pow2: usize,
    rows_per_lane: usize,
    cts_per_chn: usize,
    n: usize,
) -> usize {
    let half: usize = n >> 1;
    let (off_h, off_w) = filter.shape.offset();
    let in_sets: usize = shape.chn.div_ceil(2);
    let out_sets: usize = filter.shape.out_chn.div_ceil(2);
    let r: isize = cts_per_chn as isize;

    for set in 0..in_sets {
        for i in 0..cts_per_chn {
            let in_ct: usize = set * cts_per_chn + i;
            for a in 0..filter.shape.f_h {
                // output rows of ciphertext `j` read input rows of ciphertext `i`,
                // `carry` lane rows further down
                let v: isize = i as isize + off_h as isize - a as isize;
                let (j, carry) = (v.rem_euclid(r) as usize, v.div_euclid(r));
                for b in 0..filter.shape.f_w {
                    let rot: usize = ((b as isize - off_w as isize) - carry * row_pow2 as isize)
                        as usize
                        & (half - 1);
                    for out_set in 0..out_sets {
                        for lp in 0..2 {
                            let mut slots: Vec<u64> = vec![0u64; n];
                            for lane in 0..2 {
                                let ci: usize = 2 * set + lane;
                                let co: usize = 2 * out_set + (lane + lp) % 2;
                                if ci >= shape.chn || co >= filter.shape.out_chn {
                                    continue;
                                }
                                let coeff: u64 = filter.w[co][ci][a][b];
                                for k in 0..rows_per_lane {
                                    let h: usize = j + cts_per_chn * k;
                                    if h >= shape.h
                                        || !(h + a).checked_sub(off_h).is_some_and(|t| t < shape.h)
                                    {
                                        continue;
                                    }
                                    for w in 0..shape.w {
                                        if (w + b).checked_sub(off_w).is_some_and(|t| t < shape.w) {
                                            slots[lane * half + k * row_pow2 + w] = coeff;
                                        }
                                    }
                                }
                            }
                            let dest: usize = 2 * (out_set * cts_per_chn + j) + lp;
                            builder.push(in_ct, rot, dest, &slots);
                        }
                    }
                }
            }
        }
    }
    2 * out_sets * cts_per_chn
}

fn accumulate(
    eval: &Evaluator,
    ct_mat: &[Vec<Ciphertext>],
    filter: &Conv2dFilter,
) -> Result<Vec<Ciphertext>, LinalgError> {
    check_len("input ciphertexts", filter.groups.len(), ct_mat.len())?;
    let mut mid: Vec<Ciphertext> = vec![eval.zero(); filter.num_mid];
    for (windows, groups) in ct_mat.iter().zip(filter.groups.iter()) {
        check_len("input windows", filter.num_windows, windows.len())?;
        for (w, ct) in windows.iter().enumerate() {
            let digits: Digits = eval.hoisted_decompose(ct);
            for group in groups {
                let rotated: Ciphertext = eval.automorphism_digits(group.rot, ct, &digits)?;
                for product in group.products.iter() {
                    eval.mult_plain_add_inplace(&rotated, &product.plains[w], &mut mid[product.dest]);
                }
            }
        }
    }
    Ok(mid)
}

fn add_bias(eval: &Evaluator, out: &mut [Ciphertext], filter: &Conv2dFilter) {
    if let Some(bias) = &filter.bias {
        out.iter_mut()
            .zip(bias.iter())
            .for_each(|(ct, b)| eval.add_plain_inplace(ct, b));
    }
}

/// One-stage evaluation; the partial sums are the outputs.
#[instrument(skip_all, fields(in_cts = ct_mat.len()))]
pub fn conv_2d_online(
    eval: &Evaluator,
    ct_mat: &[Vec<Ciphertext>],
    filter: &Conv2dFilter,
) -> Result<Vec<Ciphertext>, LinalgError> {
    if filter.strategy != Conv2dStrategy::ChannelOneStage {
        return Err(LinalgError::Shape(format!(
            "filter prepared for {:?} cannot run in one stage",
            filter.strategy
        )));
    }
    let mut out: Vec<Ciphertext> = accumulate(eval, ct_mat, filter)?;
    add_bias(eval, &mut out, filter);
    Ok(out)
}

/// Two-stage evaluation: tap rotations on the inputs, then one merge
/// rotation per partial sum.
#[instrument(skip_all, fields(in_cts = ct_mat.len()))]
pub fn conv_2d_2stage_online(
    eval: &Evaluator,
    ct_mat: &[Vec<Ciphertext>],
    filter: &Conv2dFilter,
) -> Result<Vec<Ciphertext>, LinalgError> {
    let chunk: usize = match (filter.strategy, filter.tiling) {
        (Conv2dStrategy::ChannelTwoStage, Tiling::Channel { per_ct, .. }) => per_ct,
        (Conv2dStrategy::RowTiled, _) => 2,
        _ => {
            return Err(LinalgError::Shape(format!(
                "filter prepared for {:?} cannot run in two stages",
                filter.strategy
            )));
        }
    };
    let rots: Vec<usize> = filter.merge_rotations(eval.params().n());
    let mid: Vec<Ciphertext> = accumulate(eval, ct_mat, filter)?;
    let mut out: Vec<Ciphertext> = mid
        .chunks(chunk)
        .map(|parts| -> Result<Ciphertext, LinalgError> {
            let mut acc: Ciphertext = parts[0].clone();
            for (part, &rot) in parts[1..].iter().zip(rots.iter()) {
                let rotated: Ciphertext = eval.automorphism(rot, part)?;
                eval.add_inplace(&mut acc, &rotated);
            }
            Ok(acc)
        })
        .collect::<Result<_, _>>()?;
    add_bias(eval, &mut out, filter);
    Ok(out)
}

/// Decrypts and unpacks an output feature map of shape `shape`.
pub fn postprocess_conv(
    params: &Parameters,
    sk: &SecretKey,
    ct_vec: &[Ciphertext],
    shape: &ConvShape,
) -> Result<Activations, LinalgError> {
    let n: usize = params.n();
    let tiling: Tiling = Tiling::for_shape(shape, n)?;
    check_len("output ciphertexts", tiling.num_cts(shape.chn), ct_vec.len())?;
    let slots: Vec<Vec<u64>> = ct_vec
        .iter()
        .map(|ct| params.decrypt_decode(sk, ct))
        .collect();
    Ok(tiling.unpack(&slots, *shape, n))
}

/// "Same" convolution mod p, bias included.
pub fn conv_2d_pt(input: &Activations, filter: &Filter2d, p: u64) -> Activations {
    let shape: ConvShape = input.shape;
    let fs = filter.shape;
    let (off_h, off_w) = fs.offset();
    let mut out: Activations = Activations::new(ConvShape::new(fs.out_chn, shape.h, shape.w));
    for (co, rows) in out.act.iter_mut().enumerate() {
        for (h, row) in rows.iter_mut().enumerate() {
            for (w, x) in row.iter_mut().enumerate() {
                let mut acc: u64 = filter.b[co] % p;
                for ci in 0..fs.in_chn {
                    for a in 0..fs.f_h {
                        for b in 0..fs.f_w {
                            let ih: Option<usize> = (h + a).checked_sub(off_h).filter(|&t| t < shape.h);
                            let iw: Option<usize> = (w + b).checked_sub(off_w).filter(|&t| t < shape.w);
                            if let (Some(ih), Some(iw)) = (ih, iw) {
                                acc = (acc + filter.w[co][ci][a][b] % p * (input.act[ci][ih][iw] % p)) % p;
                            }
                        }
                    }
                }
                *x = acc;
            }
        }
    }
    out
}
