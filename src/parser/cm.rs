//! Parsing of connection-management messages.

use std::io::Read;

use crate::parser::{primitive, Result};
use crate::protocol::{ErrorCode, VolumeMode, VolumeStatus};

/// File Server Status broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStatus {
    /// Busy bitfield: bit 0 reading, bit 1 writing.
    pub status: u8,
    /// Number of files the server currently holds open.
    pub open_files: u8,
}

pub fn fs_status(src: &mut impl Read) -> Result<FsStatus> {
    Ok(FsStatus { status: primitive::u8(src)?, open_files: primitive::u8(src)? })
}

/// Client Connection Maintenance message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcMaintenance {
    pub version: u8,
}

pub fn cc_maintenance(src: &mut impl Read) -> Result<CcMaintenance> {
    Ok(CcMaintenance { version: primitive::u8(src)? })
}

/// Get File Server Properties request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesReq {
    pub tan: u8,
}

pub fn properties_req(src: &mut impl Read) -> Result<PropertiesReq> {
    Ok(PropertiesReq { tan: primitive::u8(src)? })
}

/// Get File Server Properties response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub version: u8,
    pub max_open_files: u8,
    pub capabilities: u8,
}

pub fn properties_res(src: &mut impl Read) -> Result<PropertiesRes> {
    Ok(PropertiesRes {
        tan: primitive::u8(src)?,
        error: primitive::variant(src)?,
        version: primitive::u8(src)?,
        max_open_files: primitive::u8(src)?,
        capabilities: primitive::u8(src)?,
    })
}

/// Volume Status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeStatusReq {
    pub tan: u8,
    pub mode: VolumeMode,
    /// Volume path; empty means "the volume of the current directory".
    pub name: String,
}

pub fn volume_status_req(src: &mut impl Read) -> Result<VolumeStatusReq> {
    Ok(VolumeStatusReq {
        tan: primitive::u8(src)?,
        mode: primitive::variant(src)?,
        name: primitive::name(src)?,
    })
}

/// Volume Status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeStatusRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub status: VolumeStatus,
    pub name: String,
}

pub fn volume_status_res(src: &mut impl Read) -> Result<VolumeStatusRes> {
    Ok(VolumeStatusRes {
        tan: primitive::u8(src)?,
        error: primitive::variant(src)?,
        status: primitive::variant(src)?,
        name: primitive::name(src)?,
    })
}
