//! Decoding of ISO 11783-13 file-server messages.
//!
//! The first payload byte selects the command group and function; the rest of
//! the payload is little-endian. [`request`] decodes client-to-server frames,
//! [`response`] decodes server-to-client frames. Both reject frames shorter
//! than the minimum transfer length so the caller can answer with a negative
//! acknowledgment.

pub mod ack;
pub mod cm;
pub mod dh;
pub mod dirent;
pub mod fa;
pub mod primitive;

#[cfg(test)]
mod tests;

use std::io::{self, Cursor};
use std::string::FromUtf8Error;

use crate::protocol::{cm as cmf, dh as dhf, fa as faf, CommandGroup, GroupFunction};
use crate::protocol::{ErrorCode, MIN_TRANSFER_LEN};

/// Result of parsing operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing errors.
#[derive(Debug)]
pub enum Error {
    /// The underlying read failed or the payload was truncated.
    IO(io::Error),
    /// The frame is shorter than the minimum transfer length.
    ShortFrame(usize),
    /// The command group is not one this implementation serves.
    UnsupportedGroup(GroupFunction),
    /// The function number is unknown within a served command group.
    UnsupportedFunction(GroupFunction),
    /// A wire enum carried a value outside its defined range.
    EnumDiscMismatch,
    /// A length-prefixed name exceeds the allowed maximum.
    NameTooLong,
    /// A name was not valid UTF-8.
    IncorrectString(FromUtf8Error),
}

impl Error {
    /// The Annex B.9 code a server reflects for this parse failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::IO(_) | Error::ShortFrame(_) => ErrorCode::InvalidRequestLength,
            Error::NameTooLong => ErrorCode::InvalidRequestLength,
            Error::UnsupportedGroup(_) | Error::UnsupportedFunction(_) => {
                ErrorCode::FunctionNotSupported
            }
            Error::EnumDiscMismatch | Error::IncorrectString(_) => ErrorCode::MalformedRequest,
        }
    }
}

/// A decoded client-to-server request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CcMaintenance(cm::CcMaintenance),
    GetFsProperties(cm::PropertiesReq),
    VolumeStatus(cm::VolumeStatusReq),
    GetCurrentDir(dh::GetCurrentDirReq),
    ChangeCurrentDir(dh::ChangeCurrentDirReq),
    OpenFile(fa::OpenFileReq),
    SeekFile(fa::SeekFileReq),
    ReadFile(fa::ReadFileReq),
    WriteFile(fa::WriteFileReq),
    CloseFile(fa::CloseFileReq),
}

/// A decoded server-to-client response or broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    FsStatus(cm::FsStatus),
    GetFsProperties(cm::PropertiesRes),
    VolumeStatus(cm::VolumeStatusRes),
    GetCurrentDir(dh::GetCurrentDirRes),
    ChangeCurrentDir(dh::ChangeCurrentDirRes),
    OpenFile(fa::OpenFileRes),
    SeekFile(fa::SeekFileRes),
    ReadFile(fa::ReadFileRes),
    WriteFile(fa::WriteFileRes),
    CloseFile(fa::CloseFileRes),
}

impl Response {
    /// The group/function byte this response arrived under.
    pub fn group_function(&self) -> GroupFunction {
        use CommandGroup::*;
        match self {
            Response::FsStatus(_) => GroupFunction::new(ConnectionManagement, cmf::FS_STATUS),
            Response::GetFsProperties(_) => {
                GroupFunction::new(ConnectionManagement, cmf::GET_FS_PROPERTIES)
            }
            Response::VolumeStatus(_) => {
                GroupFunction::new(ConnectionManagement, cmf::VOLUME_STATUS)
            }
            Response::GetCurrentDir(_) => {
                GroupFunction::new(DirectoryHandling, dhf::GET_CURRENT_DIR)
            }
            Response::ChangeCurrentDir(_) => {
                GroupFunction::new(DirectoryHandling, dhf::CHANGE_CURRENT_DIR)
            }
            Response::OpenFile(_) => GroupFunction::new(FileAccess, faf::OPEN_FILE),
            Response::SeekFile(_) => GroupFunction::new(FileAccess, faf::SEEK_FILE),
            Response::ReadFile(_) => GroupFunction::new(FileAccess, faf::READ_FILE),
            Response::WriteFile(_) => GroupFunction::new(FileAccess, faf::WRITE_FILE),
            Response::CloseFile(_) => GroupFunction::new(FileAccess, faf::CLOSE_FILE),
        }
    }

    /// The transaction number, absent only on the status broadcast.
    pub fn tan(&self) -> Option<u8> {
        match self {
            Response::FsStatus(_) => None,
            Response::GetFsProperties(r) => Some(r.tan),
            Response::VolumeStatus(r) => Some(r.tan),
            Response::GetCurrentDir(r) => Some(r.tan),
            Response::ChangeCurrentDir(r) => Some(r.tan),
            Response::OpenFile(r) => Some(r.tan),
            Response::SeekFile(r) => Some(r.tan),
            Response::ReadFile(r) => Some(r.tan),
            Response::WriteFile(r) => Some(r.tan),
            Response::CloseFile(r) => Some(r.tan),
        }
    }

    /// The carried error code, absent only on the status broadcast.
    pub fn error(&self) -> Option<ErrorCode> {
        match self {
            Response::FsStatus(_) => None,
            Response::GetFsProperties(r) => Some(r.error),
            Response::VolumeStatus(r) => Some(r.error),
            Response::GetCurrentDir(r) => Some(r.error),
            Response::ChangeCurrentDir(r) => Some(r.error),
            Response::OpenFile(r) => Some(r.error),
            Response::SeekFile(r) => Some(r.error),
            Response::ReadFile(r) => Some(r.error),
            Response::WriteFile(r) => Some(r.error),
            Response::CloseFile(r) => Some(r.error),
        }
    }
}

/// Decodes a client-to-server frame.
pub fn request(bytes: &[u8]) -> Result<Request> {
    let gf = frame_header(bytes)?;
    let mut src = Cursor::new(&bytes[1..]);
    match gf.group() {
        Some(CommandGroup::ConnectionManagement) => match gf.function() {
            cmf::CC_MAINTENANCE => Ok(Request::CcMaintenance(cm::cc_maintenance(&mut src)?)),
            cmf::GET_FS_PROPERTIES => Ok(Request::GetFsProperties(cm::properties_req(&mut src)?)),
            cmf::VOLUME_STATUS => Ok(Request::VolumeStatus(cm::volume_status_req(&mut src)?)),
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::DirectoryHandling) => match gf.function() {
            dhf::GET_CURRENT_DIR => Ok(Request::GetCurrentDir(dh::get_current_dir_req(&mut src)?)),
            dhf::CHANGE_CURRENT_DIR => {
                Ok(Request::ChangeCurrentDir(dh::change_current_dir_req(&mut src)?))
            }
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::FileAccess) => match gf.function() {
            faf::OPEN_FILE => Ok(Request::OpenFile(fa::open_file_req(&mut src)?)),
            faf::SEEK_FILE => Ok(Request::SeekFile(fa::seek_file_req(&mut src)?)),
            faf::READ_FILE => Ok(Request::ReadFile(fa::read_file_req(&mut src)?)),
            faf::WRITE_FILE => Ok(Request::WriteFile(fa::write_file_req(&mut src)?)),
            faf::CLOSE_FILE => Ok(Request::CloseFile(fa::close_file_req(&mut src)?)),
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::FileHandling) | Some(CommandGroup::VolumeHandling) | None => {
            Err(Error::UnsupportedGroup(gf))
        }
    }
}

/// Decodes a server-to-client frame.
pub fn response(bytes: &[u8]) -> Result<Response> {
    let gf = frame_header(bytes)?;
    let mut src = Cursor::new(&bytes[1..]);
    match gf.group() {
        Some(CommandGroup::ConnectionManagement) => match gf.function() {
            cmf::FS_STATUS => Ok(Response::FsStatus(cm::fs_status(&mut src)?)),
            cmf::GET_FS_PROPERTIES => Ok(Response::GetFsProperties(cm::properties_res(&mut src)?)),
            cmf::VOLUME_STATUS => Ok(Response::VolumeStatus(cm::volume_status_res(&mut src)?)),
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::DirectoryHandling) => match gf.function() {
            dhf::GET_CURRENT_DIR => Ok(Response::GetCurrentDir(dh::get_current_dir_res(&mut src)?)),
            dhf::CHANGE_CURRENT_DIR => {
                Ok(Response::ChangeCurrentDir(dh::change_current_dir_res(&mut src)?))
            }
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::FileAccess) => match gf.function() {
            faf::OPEN_FILE => Ok(Response::OpenFile(fa::open_file_res(&mut src)?)),
            faf::SEEK_FILE => Ok(Response::SeekFile(fa::seek_file_res(&mut src)?)),
            faf::READ_FILE => Ok(Response::ReadFile(fa::read_file_res(&mut src)?)),
            faf::WRITE_FILE => Ok(Response::WriteFile(fa::write_file_res(&mut src)?)),
            faf::CLOSE_FILE => Ok(Response::CloseFile(fa::close_file_res(&mut src)?)),
            _ => Err(Error::UnsupportedFunction(gf)),
        },
        Some(CommandGroup::FileHandling) | Some(CommandGroup::VolumeHandling) | None => {
            Err(Error::UnsupportedGroup(gf))
        }
    }
}

fn frame_header(bytes: &[u8]) -> Result<GroupFunction> {
    if bytes.len() < MIN_TRANSFER_LEN {
        return Err(Error::ShortFrame(bytes.len()));
    }
    Ok(GroupFunction(bytes[0]))
}
