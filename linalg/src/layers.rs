/// Channels, height and width of a feature map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvShape {
    pub chn: usize,
    pub h: usize,
    pub w: usize,
}

impl ConvShape {
    pub fn new(chn: usize, h: usize, w: usize) -> Self {
        Self { chn, h, w }
    }

    pub fn pixels(&self) -> usize {
        self.h * self.w
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterShape {
    pub out_chn: usize,
    pub in_chn: usize,
    pub f_h: usize,
    pub f_w: usize,
}

impl FilterShape {
    pub fn new(out_chn: usize, in_chn: usize, f_h: usize, f_w: usize) -> Self {
        Self {
            out_chn,
            in_chn,
            f_h,
            f_w,
        }
    }

    /// Top-left offset of "same" padding, `((f_h - 1)/2, (f_w - 1)/2)`.
    pub fn offset(&self) -> (usize, usize) {
        ((self.f_h - 1) / 2, (self.f_w - 1) / 2)
    }
}

/// Weights indexed `w[out][in][row][col]` and one bias per output channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter2d {
    pub shape: FilterShape,
    pub w: Vec<Vec<Vec<Vec<u64>>>>,
    pub b: Vec<u64>,
}

impl Filter2d {
    /// All-zero filter, bias included.
    pub fn new(shape: FilterShape) -> Self {
        Self {
            shape,
            w: vec![vec![vec![vec![0; shape.f_w]; shape.f_h]; shape.in_chn]; shape.out_chn],
            b: vec![0; shape.out_chn],
        }
    }

    pub fn has_bias(&self) -> bool {
        self.b.iter().any(|&b| b != 0)
    }
}

/// Feature map indexed `act[chn][row][col]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activations {
    pub shape: ConvShape,
    pub act: Vec<Vec<Vec<u64>>>,
}

impl Activations {
    pub fn new(shape: ConvShape) -> Self {
        Self {
            shape,
            act: vec![vec![vec![0; shape.w]; shape.h]; shape.chn],
        }
    }
}
