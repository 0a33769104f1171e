use fv::FvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error(transparent)]
    Fv(#[from] FvError),
    #[error("unsupported shape: {0}")]
    Shape(String),
    #[error("{what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}
