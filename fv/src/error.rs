use math::MathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FvError {
    #[error(transparent)]
    Math(#[from] MathError),
    #[error("window size {0} must be in [1, 60]")]
    InvalidWindowSize(usize),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("no rotation key for rotation {0}")]
    MissingRotationKey(usize),
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("serialization failed: {0}")]
    Io(#[from] std::io::Error),
}
