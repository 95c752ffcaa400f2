//! Table-driven exercise of a live server.
//!
//! The harness walks its cases serially: connect, server properties, volume
//! status, current directory, a table of change-directory patterns, open,
//! seek and read checks against a file of known content, then teardown. A
//! watchdog bounds every case; only the connect case is a prerequisite whose
//! failure aborts the remaining cases.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::parser::Response;
use crate::protocol::{
    ErrorCode, SeekMode, VolumeMode, FILE_HANDLE_ERROR, MAX_DATA_LEN, OPEN_READ,
};

use super::{Engine, Event, Flow, State};

/// Watchdog applied to every case.
pub const CASE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Volume the harness runs against.
pub const TEST_VOLUME: &str = r"\\vol1";
/// Fixture directory on the test volume.
pub const TEST_DIR: &str = r"\\vol1\selftest";
/// Pattern file of [`PATTERN_FILE_LEN`] bytes inside the fixture directory.
pub const PATTERN_FILE: &str = r"\\vol1\selftest\pattern.bin";
/// Length of the pattern file.
pub const PATTERN_FILE_LEN: u64 = 1024;

/// The expected byte at `offset` of a pattern file: the big-endian 32-bit
/// word holding its own word index, xored with a fixed 4-byte mask.
pub fn pattern_byte(offset: u64) -> u8 {
    const MASK: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
    let word = (offset >> 2) as u32;
    let byte = (word >> ((3 - (offset & 3)) * 8)) as u8;
    byte ^ MASK[(offset & 3) as usize]
}

/// One change-current-directory pattern with its expected outcome.
pub struct CcdPattern {
    pub pattern: &'static str,
    pub expect_pass: bool,
}

/// The pattern walk assumes the fixture tree `dir1/dir2`, `dir5`, `mfs`,
/// `selftest/nested/deep` and the file `selftest/pattern.bin` under `vol1`.
/// Outcomes are annotated against the directory the walk is in when the
/// pattern is sent.
pub static CCD_PATTERNS: &[CcdPattern] = &[
    CcdPattern { pattern: r"\\vol1", expect_pass: true },
    CcdPattern { pattern: r"\\vol1\dir1", expect_pass: true },
    CcdPattern { pattern: r"dir2", expect_pass: true },
    CcdPattern { pattern: r"..\\\", expect_pass: true },
    CcdPattern { pattern: r"..\dir5", expect_pass: true },
    CcdPattern { pattern: r".", expect_pass: true },
    CcdPattern { pattern: r"..", expect_pass: true },
    CcdPattern { pattern: r"..\..\..", expect_pass: true },
    CcdPattern { pattern: r"dir1\dir2", expect_pass: true },
    CcdPattern { pattern: r"\\\\", expect_pass: false },
    CcdPattern { pattern: r"\\\vol1", expect_pass: false },
    CcdPattern { pattern: r"\\", expect_pass: false },
    CcdPattern { pattern: r"\~", expect_pass: false },
    CcdPattern { pattern: r"\\~", expect_pass: false },
    CcdPattern { pattern: r"\\~\mfs", expect_pass: false },
    CcdPattern { pattern: r"~", expect_pass: true },
    CcdPattern { pattern: r"~\", expect_pass: true },
    CcdPattern { pattern: r"..", expect_pass: true },
    CcdPattern { pattern: r"~\..", expect_pass: true },
    CcdPattern { pattern: r"\\vol1\selftest", expect_pass: true },
    CcdPattern { pattern: r"nested", expect_pass: true },
    CcdPattern { pattern: r"deep", expect_pass: true },
    CcdPattern { pattern: r"..\..\..", expect_pass: true },
    CcdPattern { pattern: r"selftest\nested\deep", expect_pass: true },
    CcdPattern { pattern: r"\\vol1\selftest\pattern.bin", expect_pass: false },
    CcdPattern { pattern: r"\\vol1\missing", expect_pass: false },
    CcdPattern { pattern: r"missing", expect_pass: false },
    CcdPattern { pattern: r"bad|name", expect_pass: false },
    CcdPattern { pattern: r"bad*name", expect_pass: false },
    CcdPattern { pattern: r"bad?name", expect_pass: false },
    CcdPattern { pattern: r"bad<name", expect_pass: false },
    CcdPattern { pattern: r"bad>name", expect_pass: false },
    CcdPattern { pattern: r"bad/name", expect_pass: false },
    CcdPattern { pattern: "\u{0001}bad", expect_pass: false },
    CcdPattern { pattern: "\u{009F}bad", expect_pass: false },
    CcdPattern { pattern: r"\\VOL1", expect_pass: true },
    CcdPattern { pattern: r"\\VOL1\DIR1", expect_pass: false },
    CcdPattern { pattern: r"\\vol1\dir1\.\..\dir1", expect_pass: true },
    CcdPattern { pattern: r"dir2\~", expect_pass: false },
    CcdPattern { pattern: r"..\dir5\..\dir1\dir2", expect_pass: true },
    CcdPattern { pattern: r"", expect_pass: true },
    CcdPattern { pattern: r"..\..", expect_pass: true },
    CcdPattern { pattern: r"selftest", expect_pass: true },
    CcdPattern { pattern: r"\\vol1", expect_pass: true },
];

/// Seek checks against the pattern file: origin, offset, expected reached
/// position (`None` expects a rejected seek).
static SF_PATTERNS: &[(SeekMode, i32, Option<u32>)] = &[
    (SeekMode::Set, 0, Some(0)),
    (SeekMode::Set, 10, Some(10)),
    (SeekMode::Current, -4, Some(6)),
    (SeekMode::End, 0, Some(PATTERN_FILE_LEN as u32)),
    (SeekMode::End, -24, Some(PATTERN_FILE_LEN as u32 - 24)),
    (SeekMode::Set, -1, None),
    (SeekMode::End, 1, None),
    (SeekMode::Current, -2000, None),
    (SeekMode::Set, 0, Some(0)),
];

/// Read checks: seek offset and read count. The expected payload is the
/// pattern bytes truncated at the file length; a read at the end of the file
/// expects the end-of-file code with no data.
static RF_PATTERNS: &[(u32, u16)] = &[
    (0, 16),
    (0, 1024),
    (10, 64),
    (1000, 100),
    (0, MAX_DATA_LEN as u16),
    (1024, 16),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CaseKind {
    Connect,
    Properties,
    VolumeStatus,
    CurrentDir,
    ChangeDirPatterns,
    OpenFile,
    SeekFile,
    ReadFile,
    Teardown,
}

struct Case {
    name: &'static str,
    kind: CaseKind,
    /// A failed prerequisite aborts the remaining cases.
    prerequisite: bool,
}

static CASES: &[Case] = &[
    Case { name: "connect", kind: CaseKind::Connect, prerequisite: true },
    Case { name: "fs properties", kind: CaseKind::Properties, prerequisite: false },
    Case { name: "volume status", kind: CaseKind::VolumeStatus, prerequisite: false },
    Case { name: "current directory", kind: CaseKind::CurrentDir, prerequisite: false },
    Case {
        name: "change directory patterns",
        kind: CaseKind::ChangeDirPatterns,
        prerequisite: false,
    },
    Case { name: "open file", kind: CaseKind::OpenFile, prerequisite: false },
    Case { name: "seek file", kind: CaseKind::SeekFile, prerequisite: false },
    Case { name: "read file", kind: CaseKind::ReadFile, prerequisite: false },
    Case { name: "teardown", kind: CaseKind::Teardown, prerequisite: false },
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ReadPhase {
    Seek,
    Read,
}

/// The running harness.
pub struct Selftest {
    case: usize,
    case_deadline: Instant,
    /// Change-directory pattern counter.
    ccd_index: usize,
    /// Seek pattern counter.
    sf_index: usize,
    /// Read pattern counter.
    rf_index: usize,
    rf_phase: ReadPhase,
    /// Open-file sub-step: 0 opens the fixture directory as a plain file and
    /// must fail, 1 opens the pattern file and must succeed.
    of_step: u8,
    handle: Option<u8>,
    failures: u32,
}

impl Selftest {
    pub fn new(now: Instant) -> Self {
        Self {
            case: 0,
            case_deadline: now + CASE_TIMEOUT,
            ccd_index: 0,
            sf_index: 0,
            rf_index: 0,
            rf_phase: ReadPhase::Seek,
            of_step: 0,
            handle: None,
            failures: 0,
        }
    }

    pub fn case_deadline(&self) -> Instant {
        self.case_deadline
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn start(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        engine.console_line("selftest: starting".to_owned());
        self.begin_case(engine, now)
    }

    pub fn on_tick(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        if now >= self.case_deadline {
            return self.case_fail(engine, now, "watchdog expired");
        }
        Flow::Continue
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, now: Instant) -> Flow {
        let kind = CASES[self.case].kind;
        match event {
            Event::Response(response) => self.on_response(engine, kind, response, now),
            Event::TimedOut(op) => {
                warn!(?op, "selftest request timed out");
                self.case_fail(engine, now, "request timed out")
            }
            Event::Failed(op, failure) => {
                warn!(?op, %failure, "selftest transaction failed");
                self.case_fail(engine, now, "transaction failed")
            }
        }
    }

    fn on_response(
        &mut self,
        engine: &mut Engine,
        kind: CaseKind,
        response: Response,
        now: Instant,
    ) -> Flow {
        match (kind, response) {
            (CaseKind::Connect, Response::FsStatus(_)) => self.case_pass(engine, now),
            (CaseKind::Properties, Response::GetFsProperties(res)) => {
                if res.error != ErrorCode::Success {
                    return self.case_fail(engine, now, "server rejected the request");
                }
                info!(
                    version = res.version,
                    max_open_files = res.max_open_files,
                    capabilities = res.capabilities,
                    "file server properties"
                );
                self.case_pass(engine, now)
            }
            (CaseKind::VolumeStatus, Response::VolumeStatus(res)) => {
                if res.error != ErrorCode::Success {
                    return self.case_fail(engine, now, "server rejected the request");
                }
                self.case_pass(engine, now)
            }
            (CaseKind::CurrentDir, Response::GetCurrentDir(res)) => {
                if res.error != ErrorCode::Success {
                    return self.case_fail(engine, now, "server rejected the request");
                }
                info!(dir = %res.name, "current directory");
                self.case_pass(engine, now)
            }
            (CaseKind::ChangeDirPatterns, Response::ChangeCurrentDir(res)) => {
                let entry = &CCD_PATTERNS[self.ccd_index];
                let passed = res.error == ErrorCode::Success;
                if passed != entry.expect_pass {
                    self.failures += 1;
                    engine.console_line(format!(
                        "selftest: pattern {:?} expected {}, server answered {}",
                        entry.pattern,
                        if entry.expect_pass { "pass" } else { "fail" },
                        res.error
                    ));
                }
                self.ccd_index += 1;
                if self.ccd_index == CCD_PATTERNS.len() {
                    return self.case_pass(engine, now);
                }
                self.send_next_pattern(engine, now)
            }
            (CaseKind::OpenFile, Response::OpenFile(res)) => {
                if self.of_step == 0 {
                    // Opening a directory without the directory flag must be
                    // rejected.
                    if res.error == ErrorCode::Success {
                        self.failures += 1;
                        engine.console_line(
                            "selftest: directory opened as a plain file".to_owned(),
                        );
                        engine.send_close_file_noreply(res.handle, now);
                    }
                    self.of_step = 1;
                    return match engine.send_open_file_req(PATTERN_FILE, OPEN_READ, now) {
                        Ok(()) => Flow::Continue,
                        Err(_) => self.case_fail(engine, now, "cannot send open request"),
                    };
                }
                if res.error != ErrorCode::Success || res.handle == FILE_HANDLE_ERROR {
                    return self.case_fail(engine, now, "cannot open the pattern file");
                }
                self.handle = Some(res.handle);
                self.case_pass(engine, now)
            }
            (CaseKind::SeekFile, Response::SeekFile(res)) => {
                let (_, _, expected) = SF_PATTERNS[self.sf_index];
                let ok = match expected {
                    Some(position) => {
                        res.error == ErrorCode::Success && res.position == position
                    }
                    None => res.error != ErrorCode::Success,
                };
                if !ok {
                    self.failures += 1;
                    engine.console_line(format!(
                        "selftest: seek check {} answered {} position {}",
                        self.sf_index, res.error, res.position
                    ));
                }
                self.sf_index += 1;
                if self.sf_index == SF_PATTERNS.len() {
                    return self.case_pass(engine, now);
                }
                self.send_next_seek(engine, now)
            }
            (CaseKind::ReadFile, Response::SeekFile(res)) => {
                if self.rf_phase != ReadPhase::Seek || res.error != ErrorCode::Success {
                    return self.case_fail(engine, now, "cannot position the pattern file");
                }
                let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
                let (_, count) = RF_PATTERNS[self.rf_index];
                self.rf_phase = ReadPhase::Read;
                match engine.send_read_file_req(handle, count, false, now) {
                    Ok(()) => Flow::Continue,
                    Err(_) => self.case_fail(engine, now, "cannot send read request"),
                }
            }
            (CaseKind::ReadFile, Response::ReadFile(res)) => {
                let (offset, count) = RF_PATTERNS[self.rf_index];
                if !self.verify_read(engine, offset as u64, count, &res.error, &res.data) {
                    self.failures += 1;
                }
                self.rf_index += 1;
                self.rf_phase = ReadPhase::Seek;
                if self.rf_index == RF_PATTERNS.len() {
                    return self.case_pass(engine, now);
                }
                self.send_next_read_seek(engine, now)
            }
            (CaseKind::Teardown, Response::CloseFile(_)) => self.finish(engine),
            _ => Flow::Continue,
        }
    }

    fn begin_case(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        self.case_deadline = now + CASE_TIMEOUT;
        engine.set_state(State::Selftest);
        let case = &CASES[self.case];
        info!(case = case.name, "selftest case");
        let sent = match case.kind {
            CaseKind::Connect => {
                if engine.is_connected() {
                    return self.case_pass(engine, now);
                }
                Ok(())
            }
            CaseKind::Properties => engine.send_properties_req(now),
            CaseKind::VolumeStatus => {
                engine.send_volume_status_req(VolumeMode::Query, TEST_VOLUME, now)
            }
            CaseKind::CurrentDir => engine.send_current_dir_req(now),
            CaseKind::ChangeDirPatterns => {
                self.ccd_index = 0;
                return self.send_next_pattern(engine, now);
            }
            CaseKind::OpenFile => {
                self.of_step = 0;
                engine.send_open_file_req(TEST_DIR, OPEN_READ, now)
            }
            CaseKind::SeekFile => {
                self.sf_index = 0;
                return self.send_next_seek(engine, now);
            }
            CaseKind::ReadFile => {
                self.rf_index = 0;
                self.rf_phase = ReadPhase::Seek;
                return self.send_next_read_seek(engine, now);
            }
            CaseKind::Teardown => match self.handle.take() {
                Some(handle) => engine.send_close_file_req(handle, now),
                None => return self.finish(engine),
            },
        };
        match sent {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!("selftest cannot send: {err}");
                self.case_fail(engine, now, "cannot send request")
            }
        }
    }

    fn send_next_pattern(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        let entry = &CCD_PATTERNS[self.ccd_index];
        match engine.send_change_dir_req(entry.pattern, now) {
            Ok(()) => Flow::Continue,
            Err(_) => self.case_fail(engine, now, "cannot send change-directory request"),
        }
    }

    fn send_next_seek(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
        let (mode, offset, _) = SF_PATTERNS[self.sf_index];
        match engine.send_seek_file_req(handle, mode, offset, now) {
            Ok(()) => Flow::Continue,
            Err(_) => self.case_fail(engine, now, "cannot send seek request"),
        }
    }

    fn send_next_read_seek(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        let handle = self.handle.unwrap_or(FILE_HANDLE_ERROR);
        let (offset, _) = RF_PATTERNS[self.rf_index];
        self.rf_phase = ReadPhase::Seek;
        match engine.send_seek_file_req(handle, SeekMode::Set, offset as i32, now) {
            Ok(()) => Flow::Continue,
            Err(_) => self.case_fail(engine, now, "cannot send seek request"),
        }
    }

    fn verify_read(
        &self,
        engine: &mut Engine,
        offset: u64,
        count: u16,
        error: &ErrorCode,
        data: &[u8],
    ) -> bool {
        let expected_len = (PATTERN_FILE_LEN.saturating_sub(offset)).min(count as u64) as usize;
        if expected_len == 0 {
            // Reading at the end of the file must answer end-of-file with an
            // empty payload.
            if *error != ErrorCode::EndOfFile || !data.is_empty() {
                engine.console_line(format!(
                    "selftest: read at {offset} expected end of file, answered {error}"
                ));
                return false;
            }
            return true;
        }
        if *error != ErrorCode::Success || data.len() != expected_len {
            engine.console_line(format!(
                "selftest: read at {offset} count {count} answered {error} with {} bytes",
                data.len()
            ));
            return false;
        }
        for (i, byte) in data.iter().enumerate() {
            let expected = pattern_byte(offset + i as u64);
            if *byte != expected {
                engine.console_line(format!(
                    "selftest: pattern mismatch at byte {}: {byte:#04x} != {expected:#04x}",
                    offset + i as u64
                ));
                return false;
            }
        }
        true
    }

    fn case_pass(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        engine.console_line(format!("selftest: {} ok", CASES[self.case].name));
        self.advance(engine, now)
    }

    fn case_fail(&mut self, engine: &mut Engine, now: Instant, why: &str) -> Flow {
        self.failures += 1;
        engine.console_line(format!("selftest: {} failed: {why}", CASES[self.case].name));
        if CASES[self.case].prerequisite {
            engine.console_line("selftest: aborting, prerequisite failed".to_owned());
            if let Some(handle) = self.handle.take() {
                engine.send_close_file_noreply(handle, now);
            }
            return self.finish(engine);
        }
        self.advance(engine, now)
    }

    fn advance(&mut self, engine: &mut Engine, now: Instant) -> Flow {
        self.case += 1;
        if self.case == CASES.len() {
            return self.finish(engine);
        }
        self.begin_case(engine, now)
    }

    fn finish(&mut self, engine: &mut Engine) -> Flow {
        if self.failures == 0 {
            engine.console_line("selftest: all cases passed".to_owned());
        } else {
            engine.console_line(format!("selftest: completed, {} failure(s)", self.failures));
        }
        engine.record_selftest(self.failures);
        engine.set_state(State::Idle);
        Flow::Done
    }
}
