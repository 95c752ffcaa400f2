//! Parsing of packed directory-entry records.

use std::io::{Cursor, Read};

use crate::parser::{primitive, Error, Result};
use crate::protocol::DirectoryEntry;

/// Parses one directory entry record.
pub fn entry(src: &mut impl Read) -> Result<DirectoryEntry> {
    let name_len = primitive::u8(src)? as usize;
    let name = String::from_utf8(primitive::data(src, name_len)?).map_err(Error::IncorrectString)?;
    Ok(DirectoryEntry {
        name,
        attributes: primitive::u8(src)?,
        date: primitive::u16(src)?,
        time: primitive::u16(src)?,
        size: primitive::u32(src)?,
    })
}

/// Parses every directory entry packed into a counted data block.
pub fn entries(data: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let mut src = Cursor::new(data);
    let mut out = Vec::new();
    while (src.position() as usize) < data.len() {
        out.push(entry(&mut src)?);
    }
    Ok(out)
}
