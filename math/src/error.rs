use thiserror::Error;

/// Setup-time failures of the arithmetic layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("ring degree {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("log_n = {0} is outside the supported range 1..=17")]
    InvalidLogN(usize),
    #[error("modulus {modulus} is not congruent to 1 mod {order}")]
    Congruence { modulus: u64, order: u64 },
    #[error("{psi} is not a primitive {order}-th root of unity mod {modulus}")]
    NotPrimitiveRoot { psi: u64, order: u64, modulus: u64 },
    #[error("no fast reduction path for modulus {0}")]
    NoFastPath(u64),
    #[error("rotation index {rot} is out of range for {n} slots")]
    InvalidRotation { rot: usize, n: usize },
    #[error("modulus {0} must be an odd value in [3, 2^62)")]
    InvalidModulus(u64),
}
