//! Serialization of file-access messages.

use std::io::{self, Error, ErrorKind, Write};

use crate::protocol::{fa, CommandGroup, ErrorCode, GroupFunction, SeekMode, MAX_DATA_LEN};
use crate::serializer::{self, Frame};

const GROUP: CommandGroup = CommandGroup::FileAccess;

/// Builds an Open File request.
pub fn open_file_req(tan: u8, flags: u8, name: &str) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::OPEN_FILE), tan);
    serializer::u8(&mut frame, flags)?;
    serializer::name(&mut frame, name)?;
    Ok(frame.finish())
}

/// Builds an Open File response carrying the allocated handle.
pub fn open_file_res(tan: u8, error: ErrorCode, handle: u8) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::OPEN_FILE), tan);
    serializer::error(&mut frame, error)?;
    serializer::u8(&mut frame, handle)?;
    Ok(frame.finish())
}

/// Builds a Seek File request.
pub fn seek_file_req(tan: u8, handle: u8, mode: SeekMode, offset: i32) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::SEEK_FILE), tan);
    serializer::u8(&mut frame, handle)?;
    serializer::u8(&mut frame, mode as u8)?;
    serializer::i32(&mut frame, offset)?;
    Ok(frame.finish())
}

/// Builds a Seek File response carrying the reached position.
pub fn seek_file_res(tan: u8, error: ErrorCode, position: u32) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::SEEK_FILE), tan);
    serializer::error(&mut frame, error)?;
    serializer::u32(&mut frame, position)?;
    Ok(frame.finish())
}

/// Builds a Read File request.
pub fn read_file_req(tan: u8, handle: u8, count: u16, report_hidden: bool) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::READ_FILE), tan);
    serializer::u8(&mut frame, handle)?;
    serializer::u16(&mut frame, count)?;
    serializer::u8(&mut frame, report_hidden as u8)?;
    Ok(frame.finish())
}

/// Builds a Read File response. `data` carries file bytes or packed
/// directory-entry records, counted by the 16-bit length.
pub fn read_file_res(tan: u8, error: ErrorCode, data: &[u8]) -> io::Result<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(Error::new(ErrorKind::InvalidInput, "read data exceeds maximum length"));
    }
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::READ_FILE), tan);
    serializer::error(&mut frame, error)?;
    serializer::u16(&mut frame, data.len() as u16)?;
    frame.write_all(data)?;
    Ok(frame.finish())
}

/// Builds a Write File request.
pub fn write_file_req(tan: u8, handle: u8, data: &[u8]) -> io::Result<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(Error::new(ErrorKind::InvalidInput, "write data exceeds maximum length"));
    }
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::WRITE_FILE), tan);
    serializer::u8(&mut frame, handle)?;
    serializer::u16(&mut frame, data.len() as u16)?;
    frame.write_all(data)?;
    Ok(frame.finish())
}

/// Builds a Write File response.
pub fn write_file_res(tan: u8, error: ErrorCode, count: u16) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::WRITE_FILE), tan);
    serializer::error(&mut frame, error)?;
    serializer::u16(&mut frame, count)?;
    Ok(frame.finish())
}

/// Builds a Close File request.
pub fn close_file_req(tan: u8, handle: u8) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::CLOSE_FILE), tan);
    serializer::u8(&mut frame, handle)?;
    Ok(frame.finish())
}

/// Builds a Close File response.
pub fn close_file_res(tan: u8, error: ErrorCode) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, fa::CLOSE_FILE), tan);
    serializer::error(&mut frame, error)?;
    Ok(frame.finish())
}
