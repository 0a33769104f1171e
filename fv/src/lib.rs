pub mod ciphertext;
pub mod decryptor;
pub mod encryptor;
pub mod error;
pub mod evaluator;
pub mod key_generator;
pub mod keys;
pub mod keyswitch;
pub mod parameters;
mod serialization;

pub use ciphertext::Ciphertext;
pub use encryptor::Encryptor;
pub use error::FvError;
pub use evaluator::Evaluator;
pub use key_generator::KeyGenerator;
pub use keys::{KeySwitchKey, PublicKey, RotationKeys, SecretKey};
pub use keyswitch::Digits;
pub use parameters::{Parameters, ParametersLiteral, SecretDistribution};
