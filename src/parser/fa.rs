//! Parsing of file-access messages.

use std::io::Read;

use crate::parser::{primitive, Result};
use crate::protocol::{ErrorCode, SeekMode};

/// Open File request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFileReq {
    pub tan: u8,
    /// Access mode in bits 0-1, directory bit 2, append bit 3.
    pub flags: u8,
    pub name: String,
}

pub fn open_file_req(src: &mut impl Read) -> Result<OpenFileReq> {
    Ok(OpenFileReq {
        tan: primitive::u8(src)?,
        flags: primitive::u8(src)?,
        name: primitive::name(src)?,
    })
}

/// Open File response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFileRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub handle: u8,
}

pub fn open_file_res(src: &mut impl Read) -> Result<OpenFileRes> {
    Ok(OpenFileRes {
        tan: primitive::u8(src)?,
        error: primitive::variant(src)?,
        handle: primitive::u8(src)?,
    })
}

/// Seek File request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekFileReq {
    pub tan: u8,
    pub handle: u8,
    pub mode: SeekMode,
    pub offset: i32,
}

pub fn seek_file_req(src: &mut impl Read) -> Result<SeekFileReq> {
    Ok(SeekFileReq {
        tan: primitive::u8(src)?,
        handle: primitive::u8(src)?,
        mode: primitive::variant(src)?,
        offset: primitive::i32(src)?,
    })
}

/// Seek File response carrying the reached position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekFileRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub position: u32,
}

pub fn seek_file_res(src: &mut impl Read) -> Result<SeekFileRes> {
    Ok(SeekFileRes {
        tan: primitive::u8(src)?,
        error: primitive::variant(src)?,
        position: primitive::u32(src)?,
    })
}

/// Read File request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileReq {
    pub tan: u8,
    pub handle: u8,
    pub count: u16,
    /// Whether directory reads include hidden entries.
    pub report_hidden: bool,
}

pub fn read_file_req(src: &mut impl Read) -> Result<ReadFileReq> {
    Ok(ReadFileReq {
        tan: primitive::u8(src)?,
        handle: primitive::u8(src)?,
        count: primitive::u16(src)?,
        report_hidden: primitive::u8(src)? != 0,
    })
}

/// Read File response; `data` is counted by the 16-bit length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub data: Vec<u8>,
}

pub fn read_file_res(src: &mut impl Read) -> Result<ReadFileRes> {
    let tan = primitive::u8(src)?;
    let error = primitive::variant(src)?;
    let count = primitive::u16(src)? as usize;
    Ok(ReadFileRes { tan, error, data: primitive::data(src, count)? })
}

/// Write File request; the layout is recognized even though writing is
/// answered with a function-not-supported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileReq {
    pub tan: u8,
    pub handle: u8,
    pub data: Vec<u8>,
}

pub fn write_file_req(src: &mut impl Read) -> Result<WriteFileReq> {
    let tan = primitive::u8(src)?;
    let handle = primitive::u8(src)?;
    let count = primitive::u16(src)? as usize;
    Ok(WriteFileReq { tan, handle, data: primitive::data(src, count)? })
}

/// Write File response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileRes {
    pub tan: u8,
    pub error: ErrorCode,
    pub count: u16,
}

pub fn write_file_res(src: &mut impl Read) -> Result<WriteFileRes> {
    Ok(WriteFileRes {
        tan: primitive::u8(src)?,
        error: primitive::variant(src)?,
        count: primitive::u16(src)?,
    })
}

/// Close File request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFileReq {
    pub tan: u8,
    pub handle: u8,
}

pub fn close_file_req(src: &mut impl Read) -> Result<CloseFileReq> {
    Ok(CloseFileReq { tan: primitive::u8(src)?, handle: primitive::u8(src)? })
}

/// Close File response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFileRes {
    pub tan: u8,
    pub error: ErrorCode,
}

pub fn close_file_res(src: &mut impl Read) -> Result<CloseFileRes> {
    Ok(CloseFileRes { tan: primitive::u8(src)?, error: primitive::variant(src)? })
}
