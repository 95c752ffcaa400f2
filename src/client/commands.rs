//! Interactive command pipelines.
//!
//! Each command is a small state machine chaining requests: `cd` and `pwd`
//! are single transactions, `ls` and `get` chain open, seek and read until
//! the directory or file is exhausted, then close. A failure at any step
//! fires a best-effort close of any opened handle and unwinds the pipeline.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use tracing::warn;

use crate::parser::{dirent, Response};
use crate::protocol::{
    fat_date_parts, fat_time_parts, DirectoryEntry, ErrorCode, SeekMode, FILE_HANDLE_ERROR,
    MAX_DATA_LEN, OPEN_DIRECTORY, OPEN_READ,
};

use super::{Engine, Event, Failure, Flow, Op, State};

/// `cd <path>`: a single change-current-directory transaction.
pub struct CdPipeline {
    path: String,
}

impl CdPipeline {
    pub fn new(path: String) -> Self {
        Self { path }
    }

    pub fn start(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        match engine.send_change_dir_req(&self.path, now) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!("cannot send change-directory request: {err}");
                engine.console_error(Op::ChangeDir.describe(), &Failure::Local);
                engine.set_state(State::Failed(Op::ChangeDir, Failure::Local));
                Flow::Done
            }
        }
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, _now: Instant) -> Flow {
        match event {
            Event::Response(Response::ChangeCurrentDir(res)) => {
                if res.error == ErrorCode::Success {
                    engine.set_state(State::Done(Op::ChangeDir));
                } else {
                    engine.console_error(Op::ChangeDir.describe(), &Failure::Remote(res.error));
                    engine.set_state(State::Failed(Op::ChangeDir, Failure::Remote(res.error)));
                }
                Flow::Done
            }
            Event::TimedOut(op) => fail_simple(engine, op, Failure::TimedOut),
            Event::Failed(op, failure) => fail_simple(engine, op, failure),
            _ => Flow::Continue,
        }
    }
}

/// `pwd`: a single get-current-directory transaction.
pub struct PwdPipeline;

impl PwdPipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn start(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        match engine.send_current_dir_req(now) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!("cannot send current-directory request: {err}");
                engine.console_error(Op::CurrentDir.describe(), &Failure::Local);
                engine.set_state(State::Failed(Op::CurrentDir, Failure::Local));
                Flow::Done
            }
        }
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, _now: Instant) -> Flow {
        match event {
            Event::Response(Response::GetCurrentDir(res)) => {
                if res.error == ErrorCode::Success {
                    engine.console_line(res.name);
                    engine.set_state(State::Done(Op::CurrentDir));
                } else {
                    engine.console_error(Op::CurrentDir.describe(), &Failure::Remote(res.error));
                    engine.set_state(State::Failed(Op::CurrentDir, Failure::Remote(res.error)));
                }
                Flow::Done
            }
            Event::TimedOut(op) => fail_simple(engine, op, Failure::TimedOut),
            Event::Failed(op, failure) => fail_simple(engine, op, failure),
            _ => Flow::Continue,
        }
    }
}

impl Default for PwdPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Substates of the `ls` pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LsState {
    OpenDirSent,
    SeekDirSent,
    ReadDirSent,
    CloseDirSent,
}

/// `ls [-l] [path]`: open the directory, then seek/read batches of encoded
/// entries until the listing is exhausted, then close.
pub struct LsPipeline {
    long: bool,
    path: String,
    state: LsState,
    handle: Option<u8>,
    entry_count: u32,
}

impl LsPipeline {
    pub fn new(long: bool, path: String) -> Self {
        Self { long, path, state: LsState::OpenDirSent, handle: None, entry_count: 0 }
    }

    pub fn start(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        match engine.send_open_file_req(&self.path, OPEN_READ | OPEN_DIRECTORY, now) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!("cannot send open request: {err}");
                engine.console_error(Op::OpenFile.describe(), &Failure::Local);
                engine.set_state(State::Failed(Op::OpenFile, Failure::Local));
                Flow::Done
            }
        }
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, now: Instant) -> Flow {
        match (self.state, event) {
            (LsState::OpenDirSent, Event::Response(Response::OpenFile(res))) => {
                if res.error != ErrorCode::Success || res.handle == FILE_HANDLE_ERROR {
                    return self.fail(engine, Op::OpenFile, Failure::Remote(res.error), now);
                }
                self.handle = Some(res.handle);
                self.seek_to(engine, 0, now)
            }
            (LsState::SeekDirSent, Event::Response(Response::SeekFile(res))) => {
                if res.error != ErrorCode::Success {
                    return self.fail(engine, Op::SeekFile, Failure::Remote(res.error), now);
                }
                let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
                match engine.send_read_file_req(handle, MAX_DATA_LEN as u16, false, now) {
                    Ok(()) => {
                        self.state = LsState::ReadDirSent;
                        Flow::Continue
                    }
                    Err(_) => self.fail(engine, Op::ReadFile, Failure::Local, now),
                }
            }
            (LsState::ReadDirSent, Event::Response(Response::ReadFile(res))) => {
                match res.error {
                    ErrorCode::Success if !res.data.is_empty() => {
                        let entries = match dirent::entries(&res.data) {
                            Ok(entries) => entries,
                            Err(err) => {
                                warn!("undecodable directory data: {err:?}");
                                return self.fail(engine, Op::ReadFile, Failure::Local, now);
                            }
                        };
                        for entry in &entries {
                            let line = if self.long {
                                format_long(entry)
                            } else {
                                entry.name.clone()
                            };
                            engine.console_line(line);
                        }
                        self.entry_count += entries.len() as u32;
                        // One batch per read: reposition to the first entry
                        // not yet received and read again.
                        let flow = self.seek_to(engine, self.entry_count as i32, now);
                        if flow == Flow::Continue {
                            engine.set_state(State::Active(Op::ReadFile));
                        }
                        flow
                    }
                    ErrorCode::Success | ErrorCode::EndOfFile => self.close(engine, now),
                    other => self.fail(engine, Op::ReadFile, Failure::Remote(other), now),
                }
            }
            (LsState::CloseDirSent, Event::Response(Response::CloseFile(res))) => {
                if res.error != ErrorCode::Success {
                    engine.console_error(Op::CloseFile.describe(), &Failure::Remote(res.error));
                }
                if self.long {
                    engine.console_line(format!("total {}", self.entry_count));
                }
                engine.set_state(State::Done(Op::CloseFile));
                Flow::Done
            }
            (_, Event::TimedOut(op)) => self.fail(engine, op, Failure::TimedOut, now),
            (_, Event::Failed(op, failure)) => self.fail(engine, op, failure, now),
            _ => Flow::Continue,
        }
    }

    /// Number of entries received so far.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    fn seek_to(&mut self, engine: &mut Engine, position: i32, now: Instant) -> Flow {
        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
        match engine.send_seek_file_req(handle, SeekMode::Set, position, now) {
            Ok(()) => {
                self.state = LsState::SeekDirSent;
                Flow::Continue
            }
            Err(_) => self.fail(engine, Op::SeekFile, Failure::Local, now),
        }
    }

    fn close(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
        match engine.send_close_file_req(handle, now) {
            Ok(()) => {
                self.state = LsState::CloseDirSent;
                Flow::Continue
            }
            Err(_) => self.fail(engine, Op::CloseFile, Failure::Local, now),
        }
    }

    fn fail(&mut self, engine: &mut Engine, op: Op, failure: Failure, now: Instant) -> Flow {
        if let Some(handle) = self.handle.take() {
            engine.send_close_file_noreply(handle, now);
        }
        engine.console_error(op.describe(), &failure);
        engine.set_state(State::Failed(op, failure));
        Flow::Done
    }
}

/// Substates of the `get` pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum GetState {
    OpenFileSent,
    SeekFileSent,
    ReadFileSent,
    CloseFileSent,
}

/// `get <remote> [local]`: open the remote file, then seek/read/write the
/// local copy until end of file, then close both sides.
pub struct GetPipeline {
    remote: String,
    local: PathBuf,
    state: GetState,
    handle: Option<u8>,
    file: Option<std::fs::File>,
    offset: u32,
}

impl GetPipeline {
    pub fn new(remote: String, local: Option<PathBuf>) -> Self {
        let local = local.unwrap_or_else(|| {
            PathBuf::from(remote.rsplit('\\').next().unwrap_or(remote.as_str()))
        });
        Self {
            remote,
            local,
            state: GetState::OpenFileSent,
            handle: None,
            file: None,
            offset: 0,
        }
    }

    pub fn start(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        match engine.send_open_file_req(&self.remote, OPEN_READ, now) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!("cannot send open request: {err}");
                engine.console_error(Op::OpenFile.describe(), &Failure::Local);
                engine.set_state(State::Failed(Op::OpenFile, Failure::Local));
                Flow::Done
            }
        }
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, now: Instant) -> Flow {
        match (self.state, event) {
            (GetState::OpenFileSent, Event::Response(Response::OpenFile(res))) => {
                if res.error != ErrorCode::Success || res.handle == FILE_HANDLE_ERROR {
                    return self.fail(engine, Op::OpenFile, Failure::Remote(res.error), now);
                }
                self.handle = Some(res.handle);
                match std::fs::File::create(&self.local) {
                    Ok(file) => self.file = Some(file),
                    Err(err) => {
                        warn!("cannot create {}: {err}", self.local.display());
                        return self.fail(engine, Op::OpenFile, Failure::Local, now);
                    }
                }
                self.seek_to(engine, 0, now)
            }
            (GetState::SeekFileSent, Event::Response(Response::SeekFile(res))) => {
                if res.error != ErrorCode::Success {
                    return self.fail(engine, Op::SeekFile, Failure::Remote(res.error), now);
                }
                let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
                match engine.send_read_file_req(handle, MAX_DATA_LEN as u16, false, now) {
                    Ok(()) => {
                        self.state = GetState::ReadFileSent;
                        Flow::Continue
                    }
                    Err(_) => self.fail(engine, Op::ReadFile, Failure::Local, now),
                }
            }
            (GetState::ReadFileSent, Event::Response(Response::ReadFile(res))) => {
                match res.error {
                    ErrorCode::Success if !res.data.is_empty() => {
                        if let Some(file) = &mut self.file {
                            if let Err(err) = file.write_all(&res.data) {
                                warn!("cannot write {}: {err}", self.local.display());
                                return self.fail(engine, Op::ReadFile, Failure::Local, now);
                            }
                        }
                        self.offset = self.offset.saturating_add(res.data.len() as u32);
                        if self.offset > i32::MAX as u32 {
                            return self.fail(engine, Op::SeekFile, Failure::Local, now);
                        }
                        let flow = self.seek_to(engine, self.offset as i32, now);
                        if flow == Flow::Continue {
                            engine.set_state(State::Active(Op::ReadFile));
                        }
                        flow
                    }
                    ErrorCode::Success | ErrorCode::EndOfFile => {
                        engine.console_line(format!(
                            "received {} bytes into {}",
                            self.offset,
                            self.local.display()
                        ));
                        self.file = None;
                        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
                        match engine.send_close_file_req(handle, now) {
                            Ok(()) => {
                                self.state = GetState::CloseFileSent;
                                Flow::Continue
                            }
                            Err(_) => self.fail(engine, Op::CloseFile, Failure::Local, now),
                        }
                    }
                    other => self.fail(engine, Op::ReadFile, Failure::Remote(other), now),
                }
            }
            (GetState::CloseFileSent, Event::Response(Response::CloseFile(res))) => {
                if res.error != ErrorCode::Success {
                    engine.console_error(Op::CloseFile.describe(), &Failure::Remote(res.error));
                }
                engine.set_state(State::Done(Op::CloseFile));
                Flow::Done
            }
            (_, Event::TimedOut(op)) => self.fail(engine, op, Failure::TimedOut, now),
            (_, Event::Failed(op, failure)) => self.fail(engine, op, failure, now),
            _ => Flow::Continue,
        }
    }

    fn seek_to(&mut self, engine: &mut Engine, position: i32, now: Instant) -> Flow {
        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
        match engine.send_seek_file_req(handle, SeekMode::Set, position, now) {
            Ok(()) => {
                self.state = GetState::SeekFileSent;
                Flow::Continue
            }
            Err(_) => self.fail(engine, Op::SeekFile, Failure::Local, now),
        }
    }

    fn fail(&mut self, engine: &mut Engine, op: Op, failure: Failure, now: Instant) -> Flow {
        self.file = None;
        if let Some(handle) = self.handle.take() {
            engine.send_close_file_noreply(handle, now);
        }
        engine.console_error(op.describe(), &failure);
        engine.set_state(State::Failed(op, failure));
        Flow::Done
    }
}

fn fail_simple(engine: &mut Engine, op: Op, failure: Failure) -> Flow {
    engine.console_error(op.describe(), &failure);
    engine.set_state(State::Failed(op, failure));
    Flow::Done
}

fn format_long(entry: &DirectoryEntry) -> String {
    let kind = if entry.is_directory() { 'd' } else { '-' };
    let write = if entry.is_read_only() { '-' } else { 'w' };
    let (year, month, day) = fat_date_parts(entry.date);
    let (hour, minute, second) = fat_time_parts(entry.time);
    format!(
        "{kind}r{write} {:>10} {year:04}-{month:02}-{day:02} \
         {hour:02}:{minute:02}:{second:02} {}",
        entry.size, entry.name
    )
}
