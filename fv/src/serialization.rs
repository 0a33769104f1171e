use std::io::{Error, ErrorKind, Read, Result, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::dft::ntt::MAX_LOG_N;
use math::poly::Poly;

/// Upper bound on any length prefix, guarding allocations on corrupt input.
const MAX_LEN: u64 = 1 << MAX_LOG_N;

pub(crate) fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    writer.write_u64::<LittleEndian>(len as u64)
}

pub(crate) fn read_len<R: Read>(reader: &mut R) -> Result<usize> {
    let len: u64 = reader.read_u64::<LittleEndian>()?;
    if len > MAX_LEN {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("length prefix {} exceeds {}", len, MAX_LEN),
        ));
    }
    Ok(len as usize)
}

pub(crate) fn write_poly<W: Write, R>(writer: &mut W, poly: &Poly<R>) -> Result<()> {
    write_len(writer, poly.n())?;
    poly.0
        .iter()
        .try_for_each(|&x| writer.write_u64::<LittleEndian>(x))
}

/// Reads a ring element of degree `n` whose words must all lie below `q`.
pub(crate) fn read_poly<Rd: Read, R>(reader: &mut Rd, n: usize, q: u64) -> Result<Poly<R>> {
    let len: usize = read_len(reader)?;
    if len != n {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("ring element of degree {} where {} was expected", len, n),
        ));
    }
    let mut data: Vec<u64> = vec![0u64; n];
    reader.read_u64_into::<LittleEndian>(&mut data)?;
    if let Some((i, x)) = data.iter().enumerate().find(|(_, x)| **x >= q) {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("word {} at index {} is not reduced mod {}", x, i, q),
        ));
    }
    Ok(Poly::from_vec(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use math::poly::Coeff;

    #[test]
    fn unreduced_words_are_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        write_poly(&mut bytes, &Poly::<Coeff>::from_vec(vec![3, 16, 0])).unwrap();
        assert!(read_poly::<_, Coeff>(&mut bytes.as_slice(), 3, 17).is_ok());
        let err: Error = read_poly::<_, Coeff>(&mut bytes.as_slice(), 3, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(
            read_len(&mut (MAX_LEN + 1).to_le_bytes().as_slice()).unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }
}
