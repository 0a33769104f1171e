use std::io::{Error, ErrorKind, Read, Result, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::poly::{Eval, Poly};
use utils::map::Map;

use crate::error::FvError;
use crate::parameters::{Parameters, SecretDistribution};
use crate::serialization::{read_len, read_poly, write_len, write_poly};

/// Secret `s` in evaluation form.
#[derive(Clone, Debug)]
pub struct SecretKey {
    pub(crate) s: Poly<Eval>,
    pub(crate) dist: SecretDistribution,
}

impl SecretKey {
    pub fn s(&self) -> &Poly<Eval> {
        &self.s
    }

    pub fn distribution(&self) -> SecretDistribution {
        self.dist
    }
}

/// Encryption of zero `(a, b = e - a·s)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub a: Poly<Eval>,
    pub b: Poly<Eval>,
}

impl PublicKey {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_poly(writer, &self.a)?;
        write_poly(writer, &self.b)
    }

    pub fn read_from<R: Read>(reader: &mut R, params: &Parameters) -> Result<Self> {
        let (n, q) = (params.n(), params.q());
        Ok(Self {
            a: read_poly(reader, n, q)?,
            b: read_poly(reader, n, q)?,
        })
    }
}

/// Gadget encryption of a source key under a target key.
///
/// Row `i` is `(a_i, b_i = e_i + 2^(i·w)·orig - a_i·new)` for window size `w`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySwitchKey {
    pub rows: Vec<(Poly<Eval>, Poly<Eval>)>,
}

impl KeySwitchKey {
    pub fn num_windows(&self) -> usize {
        self.rows.len()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_len(writer, self.rows.len())?;
        self.rows.iter().try_for_each(|(a, b)| {
            write_poly(writer, a)?;
            write_poly(writer, b)
        })
    }

    pub fn read_from<R: Read>(reader: &mut R, params: &Parameters) -> Result<Self> {
        Self::read_with(reader, params.n(), params.q())
    }

    pub(crate) fn read_with<R: Read>(reader: &mut R, n: usize, q: u64) -> Result<Self> {
        let rows: usize = read_len(reader)?;
        let rows: Vec<(Poly<Eval>, Poly<Eval>)> = (0..rows)
            .map(|_| Ok((read_poly(reader, n, q)?, read_poly(reader, n, q)?)))
            .collect::<Result<_>>()?;
        Ok(Self { rows })
    }
}

/// Rotation keys indexed by rotation, built once and shared read-only.
///
/// Lookups of absent rotations fail with [`FvError::MissingRotationKey`].
#[derive(Clone, Debug, Default)]
pub struct RotationKeys {
    keys: Map<usize, Arc<KeySwitchKey>>,
}

impl RotationKeys {
    pub fn new() -> Self {
        Self { keys: Map::new() }
    }

    pub(crate) fn insert(&mut self, rot: usize, key: KeySwitchKey) {
        self.keys.insert(rot, Arc::new(key));
    }

    pub fn get(&self, rot: usize) -> std::result::Result<&KeySwitchKey, FvError> {
        self.keys
            .get(&rot)
            .map(|k| k.as_ref())
            .ok_or(FvError::MissingRotationKey(rot))
    }

    /// Shared handle to the key of `rot`.
    pub fn get_shared(&self, rot: usize) -> std::result::Result<Arc<KeySwitchKey>, FvError> {
        self.keys
            .get(&rot)
            .cloned()
            .ok_or(FvError::MissingRotationKey(rot))
    }

    pub fn contains(&self, rot: usize) -> bool {
        self.keys.contains_key(&rot)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Rotations present in the store, ascending.
    pub fn rotations(&self) -> Vec<usize> {
        let mut rots: Vec<usize> = self.keys.keys().copied().collect();
        rots.sort_unstable();
        rots
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let rots: Vec<usize> = self.rotations();
        write_len(writer, rots.len())?;
        rots.iter().try_for_each(|&rot| {
            writer.write_u64::<LittleEndian>(rot as u64)?;
            self.keys
                .get(&rot)
                .map_or(Ok(()), |key| key.write_to(writer))
        })
    }

    /// Fails with `InvalidData` on a rotation outside `[0, n)` or a key
    /// that does not fit `params`.
    pub fn read_from<R: Read>(reader: &mut R, params: &Parameters) -> Result<Self> {
        Self::read_with(reader, params.n(), params.q())
    }

    pub(crate) fn read_with<R: Read>(reader: &mut R, n: usize, q: u64) -> Result<Self> {
        let count: usize = read_len(reader)?;
        let mut keys: RotationKeys = RotationKeys::new();
        for _ in 0..count {
            let rot: u64 = reader.read_u64::<LittleEndian>()?;
            if rot >= n as u64 {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("rotation {} outside a ring of degree {}", rot, n),
                ));
            }
            keys.insert(rot as usize, KeySwitchKey::read_with(reader, n, q)?);
        }
        Ok(keys)
    }
}
