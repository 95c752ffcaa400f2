//! Serialization of connection-management messages.

use std::io;

use crate::protocol::{cm, CommandGroup, ErrorCode, GroupFunction, VolumeMode, VolumeStatus};
use crate::serializer::{self, Frame};

const GROUP: CommandGroup = CommandGroup::ConnectionManagement;

/// Builds a File Server Status broadcast.
pub fn fs_status(status: u8, open_files: u8) -> io::Result<Vec<u8>> {
    let mut frame = Frame::new(GroupFunction::new(GROUP, cm::FS_STATUS));
    serializer::u8(&mut frame, status)?;
    serializer::u8(&mut frame, open_files)?;
    Ok(frame.finish())
}

/// Builds a Client Connection Maintenance message.
pub fn cc_maintenance(version: u8) -> io::Result<Vec<u8>> {
    let mut frame = Frame::new(GroupFunction::new(GROUP, cm::CC_MAINTENANCE));
    serializer::u8(&mut frame, version)?;
    Ok(frame.finish())
}

/// Builds a Get File Server Properties request.
pub fn get_fs_properties_req(tan: u8) -> io::Result<Vec<u8>> {
    let frame = Frame::with_tan(GroupFunction::new(GROUP, cm::GET_FS_PROPERTIES), tan);
    Ok(frame.finish())
}

/// Builds a Get File Server Properties response.
pub fn get_fs_properties_res(
    tan: u8,
    error: ErrorCode,
    version: u8,
    max_open_files: u8,
    capabilities: u8,
) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, cm::GET_FS_PROPERTIES), tan);
    serializer::error(&mut frame, error)?;
    serializer::u8(&mut frame, version)?;
    serializer::u8(&mut frame, max_open_files)?;
    serializer::u8(&mut frame, capabilities)?;
    Ok(frame.finish())
}

/// Builds a Volume Status request.
pub fn volume_status_req(tan: u8, mode: VolumeMode, name: &str) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, cm::VOLUME_STATUS), tan);
    serializer::u8(&mut frame, mode as u8)?;
    serializer::name(&mut frame, name)?;
    Ok(frame.finish())
}

/// Builds a Volume Status response.
pub fn volume_status_res(
    tan: u8,
    error: ErrorCode,
    status: VolumeStatus,
    name: &str,
) -> io::Result<Vec<u8>> {
    let mut frame = Frame::with_tan(GroupFunction::new(GROUP, cm::VOLUME_STATUS), tan);
    serializer::error(&mut frame, error)?;
    serializer::u8(&mut frame, status as u8)?;
    serializer::name(&mut frame, name)?;
    Ok(frame.finish())
}
