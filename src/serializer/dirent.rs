//! Serialization of packed directory-entry records.

use std::io::{self, Error, ErrorKind, Write};

use crate::protocol::DirectoryEntry;
use crate::serializer;

/// Maximum bytes in a single entry name.
pub const MAX_ENTRY_NAME_LEN: usize = 255;

/// Serializes one directory entry record.
///
/// Record layout: 1-byte name length, name bytes, attribute bitfield,
/// FAT date word, FAT time word, 32-bit size.
pub fn entry(dest: &mut dyn Write, entry: &DirectoryEntry) -> io::Result<()> {
    if entry.name.len() > MAX_ENTRY_NAME_LEN {
        return Err(Error::new(ErrorKind::InvalidInput, "entry name exceeds maximum length"));
    }
    serializer::u8(dest, entry.name.len() as u8)?;
    dest.write_all(entry.name.as_bytes())?;
    serializer::u8(dest, entry.attributes)?;
    serializer::u16(dest, entry.date)?;
    serializer::u16(dest, entry.time)?;
    serializer::u32(dest, entry.size)
}

/// Serializes a run of directory entries back to back.
pub fn entries(dest: &mut dyn Write, entries: &[DirectoryEntry]) -> io::Result<()> {
    for e in entries {
        entry(dest, e)?;
    }
    Ok(())
}
