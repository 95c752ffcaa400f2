//! Parsing of the J1939 acknowledgment message (PGN 0x0E800).

use std::io::{Cursor, Read};

use crate::parser::{primitive, Error, Result};
use crate::protocol::MIN_TRANSFER_LEN;
use crate::serializer::ack::CONTROL_NACK;

/// A decoded acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub control: u8,
    /// Group/function byte of the message being acknowledged.
    pub offending: u8,
    /// Source address of the originator.
    pub originator: u8,
    /// PGN the acknowledged message arrived on.
    pub pgn: u32,
}

impl Ack {
    pub fn is_nack(&self) -> bool {
        self.control == CONTROL_NACK
    }
}

/// Decodes an acknowledgment frame.
pub fn ack(bytes: &[u8]) -> Result<Ack> {
    if bytes.len() < MIN_TRANSFER_LEN {
        return Err(Error::ShortFrame(bytes.len()));
    }
    let mut src = Cursor::new(bytes);
    let control = primitive::u8(&mut src)?;
    let offending = primitive::u8(&mut src)?;
    let mut reserved = [0u8; 2];
    src.read_exact(&mut reserved).map_err(Error::IO)?;
    let originator = primitive::u8(&mut src)?;
    let b0 = primitive::u8(&mut src)? as u32;
    let b1 = primitive::u8(&mut src)? as u32;
    let b2 = primitive::u8(&mut src)? as u32;
    Ok(Ack { control, offending, originator, pgn: b0 | (b1 << 8) | (b2 << 16) })
}
