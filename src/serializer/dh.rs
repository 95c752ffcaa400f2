//! Serialization of directory-handling messages.

use std::io;

use crate::protocol::{dh, CommandGroup, ErrorCode, GroupFunction};
use crate::serializer::{self, Frame};

const GROUP: CommandGroup = CommandGroup::DirectoryHandling;

/// Builds a Get Current Directory request.
pub fn get_current_dir_req(tan: u8) -> io::Result<Vec<u8>> {
    let frame = Frame::with_tan(GroupFunction::new(GROUP, dh::GET_CURRENT_DIR), tan);
    Ok(frame.finish())
}

/// Builds a Get Current Directory response carrying the absolute path.
pub fn get_current_dir_res(tan: u8, error: ErrorCode, name: &str) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, dh::GET_CURRENT_DIR), tan);
    serializer::error(&mut frame, error)?;
    serializer::name(&mut frame, name)?;
    Ok(frame.finish())
}

/// Builds a Change Current Directory request.
pub fn change_current_dir_req(tan: u8, name: &str) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, dh::CHANGE_CURRENT_DIR), tan);
    serializer::name(&mut frame, name)?;
    Ok(frame.finish())
}

/// Builds a Change Current Directory response.
pub fn change_current_dir_res(tan: u8, error: ErrorCode) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, dh::CHANGE_CURRENT_DIR), tan);
    serializer::error(&mut frame, error)?;
    Ok(frame.finish())
}
