pub mod conv1d;
pub mod conv2d;
pub mod error;
pub mod gemm;
pub mod layers;
pub mod layout;
pub mod matvec;
pub mod square;

pub use error::LinalgError;
pub use layers::{Activations, ConvShape, Filter2d, FilterShape};
pub use layout::{PackedOperator, PlainWindows};
