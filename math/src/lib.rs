pub mod automorphism;
pub mod dft;
pub mod encoding;
pub mod error;
pub mod modulus;
pub mod nbtheory;
pub mod poly;
pub mod ring;

pub use error::MathError;
pub use modulus::Modulus;
pub use poly::{Coeff, Eval, Poly};
pub use ring::Ring;
