//! ISO 11783-13 protocol constants and shared wire types.
//!
//! Every file-server payload starts with a single byte packing the command
//! group into bits 7-4 and the function number into bits 3-0. The remaining
//! layouts are little-endian and are parsed in [`crate::parser`] and emitted
//! in [`crate::serializer`].

use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};
use num_derive::{FromPrimitive, ToPrimitive};

/// PGN of messages sent by the file server to a client.
pub const PGN_FS_TO_CLIENT: u32 = 0x0AB00;
/// PGN of messages sent by a client to the file server.
pub const PGN_CLIENT_TO_FS: u32 = 0x0AA00;
/// PGN of the acknowledgment message used for negative acknowledgment.
pub const PGN_ACK: u32 = 0x0E800;

/// Minimum length of every transferred frame; shorter payloads are padded.
pub const MIN_TRANSFER_LEN: usize = 8;
/// Maximum length of a transferred frame.
pub const MAX_TRANSFER_LEN: usize = 65536;
/// Maximum number of data bytes carried by a single read or write message.
pub const MAX_DATA_LEN: usize = 65530;
/// Padding byte appended to frames shorter than [`MIN_TRANSFER_LEN`].
pub const PADDING_BYTE: u8 = 0xFF;

/// Maximum number of bytes in a length-prefixed path name.
pub const MAX_NAME_LEN: usize = 1024;

/// Reserved handle value meaning "no handle". Never a valid handle index.
pub const FILE_HANDLE_ERROR: u8 = 0xFF;
/// Highest usable open-handle index.
pub const MAX_HANDLES: usize = 255;

/// Protocol version number announced in properties and maintenance messages.
pub const VERSION_NUMBER: u8 = 2;

/// The first payload byte: command group in bits 7-4, function in bits 3-0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GroupFunction(pub u8);

impl GroupFunction {
    pub const fn new(group: CommandGroup, function: u8) -> Self {
        Self(((group as u8) << 4) | (function & 0x0F))
    }

    pub fn group(self) -> Option<CommandGroup> {
        CommandGroup::from_raw(self.0 >> 4)
    }

    pub fn raw_group(self) -> u8 {
        self.0 >> 4
    }

    pub fn function(self) -> u8 {
        self.0 & 0x0F
    }
}

impl fmt::Display for GroupFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cg {} fn {}", self.raw_group(), self.function())
    }
}

/// Command groups of the ISO 11783-13 file-server protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum CommandGroup {
    /// Connection management: status, maintenance, properties, volumes.
    ConnectionManagement = 0,
    /// Directory handling: current directory queries and changes.
    DirectoryHandling = 1,
    /// File access: open, seek, read, write, close.
    FileAccess = 2,
    /// File handling: move, delete, attributes. Recognized but rejected.
    FileHandling = 3,
    /// Volume handling: initialization. Recognized but rejected.
    VolumeHandling = 4,
}

impl CommandGroup {
    pub fn from_raw(raw: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(raw)
    }
}

/// Function numbers of the connection-management group.
pub mod cm {
    /// File Server Status broadcast (server) / Client Connection
    /// Maintenance (client). The direction disambiguates.
    pub const FS_STATUS: u8 = 0;
    pub const CC_MAINTENANCE: u8 = 0;
    pub const GET_FS_PROPERTIES: u8 = 1;
    pub const VOLUME_STATUS: u8 = 2;
}

/// Function numbers of the directory-handling group.
pub mod dh {
    pub const GET_CURRENT_DIR: u8 = 0;
    pub const CHANGE_CURRENT_DIR: u8 = 1;
}

/// Function numbers of the file-access group.
pub mod fa {
    pub const OPEN_FILE: u8 = 0;
    pub const SEEK_FILE: u8 = 1;
    pub const READ_FILE: u8 = 2;
    pub const WRITE_FILE: u8 = 3;
    pub const CLOSE_FILE: u8 = 4;
}

/// Function numbers of the file-handling group. All rejected.
pub mod fh {
    pub const MOVE_FILE: u8 = 0;
    pub const DELETE_FILE: u8 = 1;
    pub const GET_FILE_ATTRIBUTES: u8 = 2;
    pub const SET_FILE_ATTRIBUTES: u8 = 3;
    pub const GET_FILE_DATE_TIME: u8 = 4;
}

/// Function numbers of the volume-handling group. All rejected.
pub mod va {
    pub const INITIALIZE_VOLUME: u8 = 0;
}

/// File Server Status bit: the server is busy reading.
pub const FSS_BUSY_READING: u8 = 0x01;
/// File Server Status bit: the server is busy writing.
pub const FSS_BUSY_WRITING: u8 = 0x02;

/// Properties capability bit: the server hosts multiple volumes.
pub const CAP_MULTIPLE_VOLUMES: u8 = 0x01;

/// ISO 11783-13 Annex B.9 error codes carried in every response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ErrorCode {
    Success = 0,
    AccessDenied = 1,
    InvalidAccess = 2,
    TooManyFilesOpen = 3,
    FileOrPathNotFound = 4,
    InvalidHandle = 5,
    InvalidGivenSourceName = 6,
    InvalidGivenDestinationName = 7,
    VolumeOutOfFreeSpace = 8,
    FailureDuringWrite = 9,
    MediaNotPresent = 10,
    FailureDuringRead = 11,
    FunctionNotSupported = 12,
    VolumeNotInitialized = 13,
    InvalidRequestLength = 42,
    OutOfMemory = 43,
    AnyOtherError = 44,
    EndOfFile = 45,
    TanError = 46,
    MalformedRequest = 47,
}

impl ErrorCode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(raw)
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Short mnemonic used in user-facing failure messages.
    pub fn mnemonic(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::AccessDenied => "access denied",
            ErrorCode::InvalidAccess => "invalid access",
            ErrorCode::TooManyFilesOpen => "too many files open",
            ErrorCode::FileOrPathNotFound => "file or path not found",
            ErrorCode::InvalidHandle => "invalid handle",
            ErrorCode::InvalidGivenSourceName => "invalid given source name",
            ErrorCode::InvalidGivenDestinationName => "invalid given destination name",
            ErrorCode::VolumeOutOfFreeSpace => "volume out of free space",
            ErrorCode::FailureDuringWrite => "failure during write",
            ErrorCode::MediaNotPresent => "media not present",
            ErrorCode::FailureDuringRead => "failure during read",
            ErrorCode::FunctionNotSupported => "function not supported",
            ErrorCode::VolumeNotInitialized => "volume not initialized",
            ErrorCode::InvalidRequestLength => "invalid request length",
            ErrorCode::OutOfMemory => "out of memory",
            ErrorCode::AnyOtherError => "any other error",
            ErrorCode::EndOfFile => "end of file",
            ErrorCode::TanError => "TAN error",
            ErrorCode::MalformedRequest => "malformed request",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.raw(), self.mnemonic())
    }
}

/// Directory-entry attribute bit: entry is read only.
pub const ATTR_READ_ONLY: u8 = 0x01;
/// Directory-entry attribute bit: entry is hidden.
pub const ATTR_HIDDEN: u8 = 0x02;
/// Directory-entry attribute bit: entry names a volume.
pub const ATTR_VOLUME: u8 = 0x08;
/// Directory-entry attribute bit: entry is a directory.
pub const ATTR_DIRECTORY: u8 = 0x10;

/// Access-mode bits of the open-file flags byte.
pub const OPEN_ACCESS_MASK: u8 = 0x03;
pub const OPEN_READ: u8 = 0x00;
pub const OPEN_WRITE: u8 = 0x01;
pub const OPEN_READ_WRITE: u8 = 0x02;
/// Reserved access-mode value; rejected with [`ErrorCode::InvalidAccess`].
pub const OPEN_ACCESS_RESERVED: u8 = 0x03;
/// Open-file flag bit: open a directory instead of a file.
pub const OPEN_DIRECTORY: u8 = 0x04;
/// Open-file flag bit: append to the file on write.
pub const OPEN_APPEND: u8 = 0x08;

/// Seek origin of a seek-file request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum SeekMode {
    /// From the beginning of the file; offset must be non-negative.
    Set = 0,
    /// Relative to the current position.
    Current = 1,
    /// Relative to the end of the file; offset must be non-positive.
    End = 2,
}

impl SeekMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(raw)
    }
}

/// Volume-status request mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum VolumeMode {
    /// Report the volume status without changing its usage.
    Query = 0,
    /// The client intends to use the volume; adds a usage reference.
    InUse = 1,
    /// The client no longer uses the volume; drops its usage reference.
    Release = 2,
}

impl VolumeMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(raw)
    }
}

/// Volume status reported in a volume-status response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum VolumeStatus {
    Present = 0,
    InUse = 1,
    PrepareForRemoval = 2,
    Removed = 3,
}

/// One on-wire directory entry as carried by directory reads.
///
/// The record layout concatenates a length-prefixed name, the attribute
/// bitfield, FAT-style date and time words, and the 32-bit size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub attributes: u8,
    pub date: u16,
    pub time: u16,
    pub size: u32,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes & ATTR_READ_ONLY != 0
    }

    /// Encoded length of this entry on the wire.
    pub fn wire_len(&self) -> usize {
        1 + self.name.len() + 1 + 2 + 2 + 4
    }
}

/// Packs a calendar date into a FAT date word.
///
/// Years before 1980 clamp to the epoch of the encoding.
pub fn fat_date(year: i32, month: u32, day: u32) -> u16 {
    let year = (year - 1980).clamp(0, 127) as u16;
    (year << 9) | ((month as u16) << 5) | day as u16
}

/// Packs a wall-clock time into a FAT time word (2-second resolution).
pub fn fat_time(hour: u32, minute: u32, second: u32) -> u16 {
    ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2)
}

/// Unpacks a FAT date word into calendar components.
pub fn fat_date_parts(date: u16) -> (i32, u32, u32) {
    ((date >> 9) as i32 + 1980, ((date >> 5) & 0x0F) as u32, (date & 0x1F) as u32)
}

/// Unpacks a FAT time word into wall-clock components.
pub fn fat_time_parts(time: u16) -> (u32, u32, u32) {
    ((time >> 11) as u32, ((time >> 5) & 0x3F) as u32, ((time & 0x1F) as u32) * 2)
}

/// Converts a filesystem timestamp to FAT date and time words in local time.
pub fn fat_date_time(time: SystemTime) -> (u16, u16) {
    let local: DateTime<Local> = time.into();
    (
        fat_date(local.year(), local.month(), local.day()),
        fat_time(local.hour(), local.minute(), local.second()),
    )
}
