//! Primitive little-endian parsing utilities.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use super::{Error, Result};
use crate::protocol::MAX_NAME_LEN;

/// Parses a single byte from the `Read` source.
pub fn u8(src: &mut impl Read) -> Result<u8> {
    src.read_u8().map_err(Error::IO)
}

/// Parses a 16-bit scalar in little-endian order.
pub fn u16(src: &mut impl Read) -> Result<u16> {
    src.read_u16::<LittleEndian>().map_err(Error::IO)
}

/// Parses a 32-bit scalar in little-endian order.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<LittleEndian>().map_err(Error::IO)
}

/// Parses a signed 32-bit scalar in little-endian order.
pub fn i32(src: &mut impl Read) -> Result<i32> {
    src.read_i32::<LittleEndian>().map_err(Error::IO)
}

/// Parses a counted run of raw bytes.
pub fn data(src: &mut impl Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    src.read_exact(buf.as_mut_slice()).map_err(Error::IO)?;
    Ok(buf)
}

/// Parses a path name: a 16-bit length followed by that many UTF-8 bytes.
pub fn name(src: &mut impl Read) -> Result<String> {
    let len = u16(src)? as usize;
    if len > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    let buf = data(src, len)?;
    String::from_utf8(buf).map_err(Error::IncorrectString)
}

/// Parses a single-byte wire enum variant.
pub fn variant<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    FromPrimitive::from_u8(u8(src)?).ok_or(Error::EnumDiscMismatch)
}
