use std::io::{Read, Result, Write};

use math::poly::{Eval, Poly};

use crate::parameters::Parameters;
use crate::serialization::{read_poly, write_poly};

/// FV ciphertext `(a, b)` in evaluation form; decrypts as `a·s + b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    pub a: Poly<Eval>,
    pub b: Poly<Eval>,
}

impl Ciphertext {
    pub fn new(n: usize) -> Self {
        Self {
            a: Poly::new(n),
            b: Poly::new(n),
        }
    }

    pub fn n(&self) -> usize {
        self.b.n()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_poly(writer, &self.a)?;
        write_poly(writer, &self.b)
    }

    /// Fails with `InvalidData` on a degree other than `params.n()` or a
    /// word outside `[0, q)`.
    pub fn read_from<R: Read>(reader: &mut R, params: &Parameters) -> Result<Self> {
        Self::read_with(reader, params.n(), params.q())
    }

    pub(crate) fn read_with<R: Read>(reader: &mut R, n: usize, q: u64) -> Result<Self> {
        Ok(Self {
            a: read_poly(reader, n, q)?,
            b: read_poly(reader, n, q)?,
        })
    }
}
