//! Reference-counted table of open files and directories.
//!
//! Handles are shared: a second client opening the same resolved host path
//! joins the existing handle instead of reopening it. A handle lives until
//! the last client closes it or is evicted. Index 0xFF is reserved to mean
//! "no handle" and never appears in the table.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::protocol::{
    fat_date_time, DirectoryEntry, ErrorCode, SeekMode, ATTR_DIRECTORY, ATTR_HIDDEN,
    ATTR_READ_ONLY, MAX_DATA_LEN, MAX_HANDLES, OPEN_ACCESS_MASK, OPEN_ACCESS_RESERVED,
    OPEN_APPEND, OPEN_DIRECTORY, OPEN_READ, OPEN_READ_WRITE, OPEN_WRITE,
};
use crate::serializer;
use crate::transport::Addr;

/// Maps a host I/O failure to its Annex B.9 code.
pub fn map_io_error(err: &io::Error) -> ErrorCode {
    #[cfg(target_os = "linux")]
    if let Some(errno) = err.raw_os_error() {
        return match errno {
            libc::EACCES => ErrorCode::AccessDenied,
            libc::ENOENT => ErrorCode::FileOrPathNotFound,
            libc::EMFILE | libc::ENFILE => ErrorCode::TooManyFilesOpen,
            libc::ENOMEM => ErrorCode::OutOfMemory,
            libc::EISDIR | libc::ENOTDIR | libc::EINVAL => ErrorCode::InvalidAccess,
            libc::ENOSPC => ErrorCode::VolumeOutOfFreeSpace,
            libc::EIO => ErrorCode::FailureDuringRead,
            _ => ErrorCode::AnyOtherError,
        };
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorCode::AccessDenied,
        io::ErrorKind::NotFound => ErrorCode::FileOrPathNotFound,
        _ => ErrorCode::AnyOtherError,
    }
}

enum HandleKind {
    File { file: File, offset: u64 },
    Directory { entries: Vec<DirectoryEntry>, cursor: usize },
}

struct Handle {
    host_path: PathBuf,
    kind: HandleKind,
    clients: Vec<Addr>,
}

/// Outcome of a read: the counted payload and the code to reflect.
pub struct ReadOutcome {
    pub data: Vec<u8>,
    pub error: ErrorCode,
}

/// The shared open-handle table.
pub struct HandleTable {
    slots: Vec<Option<Handle>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self { slots: (0..MAX_HANDLES).map(|_| None).collect() }
    }

    /// Number of occupied slots, as reported in the status broadcast.
    pub fn open_count(&self) -> u8 {
        self.slots.iter().filter(|s| s.is_some()).count().min(u8::MAX as usize) as u8
    }

    /// Reference count of one handle, if it exists.
    pub fn refcount(&self, handle: u8) -> Option<usize> {
        self.slots.get(handle as usize)?.as_ref().map(|h| h.clients.len())
    }

    /// Opens a file or directory for a client and returns the handle index.
    ///
    /// An existing handle on the same host path is joined instead of
    /// reopened.
    pub async fn open(
        &mut self,
        client: Addr,
        host_path: PathBuf,
        flags: u8,
    ) -> Result<u8, ErrorCode> {
        if flags & OPEN_ACCESS_MASK == OPEN_ACCESS_RESERVED {
            return Err(ErrorCode::InvalidAccess);
        }

        if let Some(index) = self.find_by_path(&host_path) {
            if let Some(handle) = self.slots[index].as_mut() {
                // Joining must agree with the handle's kind: a directory open
                // cannot ride on a file handle or the other way around.
                let wants_directory = flags & OPEN_DIRECTORY != 0;
                let is_directory = matches!(handle.kind, HandleKind::Directory { .. });
                if wants_directory != is_directory {
                    return Err(ErrorCode::InvalidAccess);
                }
                handle.clients.push(client);
                return Ok(index as u8);
            }
        }

        let metadata =
            tokio::fs::metadata(&host_path).await.map_err(|e| map_io_error(&e))?;
        let kind = if flags & OPEN_DIRECTORY != 0 {
            if !metadata.is_dir() {
                return Err(ErrorCode::InvalidAccess);
            }
            let entries = snapshot_directory(&host_path).await?;
            HandleKind::Directory { entries, cursor: 0 }
        } else {
            if metadata.is_dir() {
                return Err(ErrorCode::InvalidAccess);
            }
            let file = open_host_file(&host_path, flags).await?;
            HandleKind::File { file, offset: 0 }
        };

        let index = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(ErrorCode::TooManyFilesOpen)?;
        self.slots[index] = Some(Handle { host_path, kind, clients: vec![client] });
        Ok(index as u8)
    }

    /// Reads up to `count` bytes from a file handle, or up to `count` bytes
    /// of packed directory-entry records from a directory handle.
    pub async fn read(
        &mut self,
        handle: u8,
        count: u16,
        report_hidden: bool,
    ) -> Result<ReadOutcome, ErrorCode> {
        let cap = (count as usize).min(MAX_DATA_LEN);
        let entry = self.get_mut(handle)?;
        match &mut entry.kind {
            HandleKind::File { file, offset } => {
                let mut data = vec![0u8; cap];
                let mut total = 0;
                while total < data.len() {
                    match file.read(&mut data[total..]).await {
                        Ok(0) => break,
                        Ok(n) => total += n,
                        Err(err) => return Err(map_io_error(&err)),
                    }
                }
                data.truncate(total);
                *offset += total as u64;
                let error = if cap > 0 && total == 0 {
                    ErrorCode::EndOfFile
                } else {
                    ErrorCode::Success
                };
                Ok(ReadOutcome { data, error })
            }
            HandleKind::Directory { entries, cursor } => {
                let mut data = Vec::new();
                let mut emitted = 0;
                for record in entries
                    .iter()
                    .filter(|e| report_hidden || e.attributes & ATTR_HIDDEN == 0)
                    .skip(*cursor)
                {
                    if data.len() + record.wire_len() > cap {
                        break;
                    }
                    serializer::dirent::entry(&mut data, record)
                        .map_err(|_| ErrorCode::AnyOtherError)?;
                    emitted += 1;
                }
                *cursor += emitted;
                Ok(ReadOutcome { data, error: ErrorCode::Success })
            }
        }
    }

    /// Repositions a handle. Files honor all three origins with their sign
    /// constraints; directories rewind to an absolute entry index.
    pub async fn seek(
        &mut self,
        handle: u8,
        mode: SeekMode,
        offset: i32,
    ) -> Result<u32, ErrorCode> {
        let entry = self.get_mut(handle)?;
        match &mut entry.kind {
            HandleKind::File { file, offset: current } => {
                let size = file.metadata().await.map_err(|e| map_io_error(&e))?.len();
                let target = match mode {
                    SeekMode::Set => {
                        if offset < 0 {
                            return Err(ErrorCode::InvalidAccess);
                        }
                        offset as u64
                    }
                    SeekMode::Current => {
                        let target = *current as i64 + offset as i64;
                        if target < 0 {
                            return Err(ErrorCode::InvalidAccess);
                        }
                        target as u64
                    }
                    SeekMode::End => {
                        if offset > 0 {
                            return Err(ErrorCode::InvalidAccess);
                        }
                        let target = size as i64 + offset as i64;
                        if target < 0 {
                            return Err(ErrorCode::InvalidAccess);
                        }
                        target as u64
                    }
                };
                file.seek(SeekFrom::Start(target)).await.map_err(|e| map_io_error(&e))?;
                *current = target;
                Ok(target.min(u32::MAX as u64) as u32)
            }
            HandleKind::Directory { entries, cursor } => {
                if mode != SeekMode::Set || offset < 0 {
                    return Err(ErrorCode::InvalidAccess);
                }
                *cursor = (offset as usize).min(entries.len());
                Ok(*cursor as u32)
            }
        }
    }

    /// Removes one reference a client holds on a handle. The last reference
    /// releases the underlying file or directory snapshot.
    pub fn close(&mut self, handle: u8, client: Addr) -> Result<(), ErrorCode> {
        let slot =
            self.slots.get_mut(handle as usize).ok_or(ErrorCode::InvalidHandle)?;
        let entry = slot.as_mut().ok_or(ErrorCode::InvalidHandle)?;
        let at = entry
            .clients
            .iter()
            .position(|&c| c == client)
            .ok_or(ErrorCode::InvalidHandle)?;
        entry.clients.remove(at);
        if entry.clients.is_empty() {
            debug!(handle, path = %entry.host_path.display(), "releasing handle");
            *slot = None;
        }
        Ok(())
    }

    /// Drops every reference a client holds. Called on eviction.
    pub fn release_client(&mut self, client: Addr) {
        for slot in &mut self.slots {
            if let Some(entry) = slot {
                entry.clients.retain(|&c| c != client);
                if entry.clients.is_empty() {
                    *slot = None;
                }
            }
        }
    }

    fn find_by_path(&self, host_path: &Path) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.as_ref().map(|h| h.host_path == host_path).unwrap_or(false)
        })
    }

    fn get_mut(&mut self, handle: u8) -> Result<&mut Handle, ErrorCode> {
        self.slots
            .get_mut(handle as usize)
            .and_then(|s| s.as_mut())
            .ok_or(ErrorCode::InvalidHandle)
    }
}

async fn open_host_file(host_path: &Path, flags: u8) -> Result<File, ErrorCode> {
    let mut options = OpenOptions::new();
    match flags & OPEN_ACCESS_MASK {
        OPEN_READ => {
            options.read(true);
        }
        OPEN_WRITE => {
            options.write(true);
            if flags & OPEN_APPEND != 0 {
                options.append(true);
            }
        }
        OPEN_READ_WRITE => {
            options.read(true).write(true);
            if flags & OPEN_APPEND != 0 {
                options.append(true);
            } else {
                options.truncate(true);
            }
        }
        _ => return Err(ErrorCode::InvalidAccess),
    }
    options.open(host_path).await.map_err(|e| map_io_error(&e))
}

/// Takes a directory snapshot at open time: every readable entry with its
/// attributes, FAT timestamps and size, sorted by name. Entries whose
/// metadata cannot be read are dropped here, which keeps the read cursor
/// dense across pagination.
async fn snapshot_directory(host_path: &Path) -> Result<Vec<DirectoryEntry>, ErrorCode> {
    let mut reader =
        tokio::fs::read_dir(host_path).await.map_err(|e| map_io_error(&e))?;
    let mut entries = Vec::new();
    loop {
        let entry = match reader.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => return Err(map_io_error(&err)),
        };
        let name = match entry.file_name().into_string() {
            Ok(name) if name.len() <= serializer::dirent::MAX_ENTRY_NAME_LEN => name,
            _ => continue,
        };
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        let mut attributes = 0;
        if metadata.is_dir() {
            attributes |= ATTR_DIRECTORY;
        }
        if metadata.permissions().readonly() {
            attributes |= ATTR_READ_ONLY;
        }
        if name.starts_with('.') {
            attributes |= ATTR_HIDDEN;
        }
        let (date, time) = metadata.modified().map(fat_date_time).unwrap_or((0, 0));
        let size = if metadata.is_dir() {
            0
        } else {
            metadata.len().min(u32::MAX as u64) as u32
        };
        entries.push(DirectoryEntry { name, attributes, date, time, size });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
