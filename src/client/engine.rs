//! The client request/response engine.
//!
//! Every request allocates a transaction number and registers a pending
//! entry keyed by `(socket, response function)` with an absolute deadline.
//! Incoming frames are matched against the pending table first; matched
//! responses are checked against the last issued transaction number and
//! delivered to the active pipeline. Unmatched file-handling or
//! volume-handling traffic is negatively acknowledged.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::parser::{self, Response};
use crate::protocol::{
    cm as cmf, dh as dhf, fa as faf, CommandGroup, GroupFunction, SeekMode, VolumeMode,
    PGN_ACK, PGN_CLIENT_TO_FS, PGN_FS_TO_CLIENT, VERSION_NUMBER,
};
use crate::serializer::{ack, cm, dh, fa};
use crate::transport::{Addr, Datagram, Outgoing, SessionEvent, SockId, MAIN_SOCK};

use super::commands::{CdPipeline, GetPipeline, LsPipeline, PwdPipeline};
use super::selftest::Selftest;
use super::{Activity, Command, Event, Failure, Flow, Op, State};

/// Deadline applied to every registered request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);
/// Capacity of the pending-request table.
pub const MAX_PENDING: usize = 10;
/// Number of transmitted frames kept for debugging.
pub const TX_LOG_LEN: usize = 10;
/// Cadence of the connection-maintenance message once connected.
pub const CCM_INTERVAL: Duration = Duration::from_millis(2000);

/// One outstanding request.
#[derive(Debug, Copy, Clone)]
struct Pending {
    sock: SockId,
    awaits: GroupFunction,
    op: Op,
    deadline: Instant,
    one_shot: bool,
}

/// The client engine.
pub struct Engine {
    server: Addr,
    state: State,
    next_tan: u8,
    pending: Vec<Option<Pending>>,
    outbox: Vec<Outgoing>,
    console: Vec<String>,
    tx_log: VecDeque<(Instant, Vec<u8>)>,
    activity: Option<Activity>,
    connected: bool,
    next_ccm: Instant,
    last_status: Option<parser::cm::FsStatus>,
    selftest_failures: Option<u32>,
}

impl Engine {
    pub fn new(server: Addr, now: Instant) -> Self {
        Self {
            server,
            state: State::Connecting,
            next_tan: 0,
            pending: (0..MAX_PENDING).map(|_| None).collect(),
            outbox: Vec::new(),
            console: Vec::new(),
            tx_log: VecDeque::with_capacity(TX_LOG_LEN),
            activity: None,
            connected: false,
            next_ccm: now,
            last_status: None,
            selftest_failures: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_status(&self) -> Option<&parser::cm::FsStatus> {
        self.last_status.as_ref()
    }

    /// Failure count of the last completed selftest run.
    pub fn selftest_failures(&self) -> Option<u32> {
        self.selftest_failures
    }

    pub(crate) fn record_selftest(&mut self, failures: u32) {
        self.selftest_failures = Some(failures);
    }

    /// The transaction number the next accepted response must carry.
    pub fn expected_tan(&self) -> u8 {
        self.next_tan.wrapping_sub(1)
    }

    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_console(&mut self) -> Vec<String> {
        std::mem::take(&mut self.console)
    }

    pub(crate) fn console_line(&mut self, line: String) {
        self.console.push(line);
    }

    /// Reports a failed pipeline step on the console, in the
    /// `Error: <what>, <failure>` shape the interactive surface prints.
    pub(crate) fn console_error(&mut self, what: &str, failure: &Failure) {
        self.console.push(format!("Error: {what}, {failure}"));
    }

    /// Starts a command unless one is already running.
    pub fn submit(&mut self, command: Command, now: Instant) {
        if self.activity.is_some() {
            self.console.push("busy: a command is already running".to_owned());
            return;
        }
        match command {
            Command::Help | Command::Exit => {}
            Command::Dmesg => self.dmesg(),
            Command::Cd { path } => self.start(Activity::Cd(CdPipeline::new(path)), now),
            Command::Pwd => self.start(Activity::Pwd(PwdPipeline::new()), now),
            Command::Ls { long, path } => {
                self.start(Activity::Ls(LsPipeline::new(long, path)), now)
            }
            Command::Get { remote, local } => {
                self.start(Activity::Get(GetPipeline::new(remote, local)), now)
            }
            Command::Selftest => self.start(Activity::Selftest(Selftest::new(now)), now),
        }
    }

    fn start(&mut self, mut activity: Activity, now: Instant) {
        match activity.start(self, now) {
            Flow::Continue => self.activity = Some(activity),
            Flow::Done => {}
        }
    }

    /// Processes one inbound datagram.
    pub fn handle_datagram(&mut self, datagram: &Datagram, now: Instant) {
        if datagram.pgn == PGN_ACK {
            match parser::ack::ack(&datagram.data) {
                Ok(decoded) if decoded.is_nack() => self.on_nack(decoded, now),
                Ok(_) => {}
                Err(err) => debug!("undecodable acknowledgment: {err:?}"),
            }
            return;
        }
        if datagram.pgn != PGN_FS_TO_CLIENT {
            debug!(pgn = datagram.pgn, "ignoring datagram");
            return;
        }
        match parser::response(&datagram.data) {
            Ok(Response::FsStatus(status)) => self.on_fs_status(status, now),
            Ok(response) => self.on_response(response, now),
            Err(parser::Error::UnsupportedGroup(gf))
            | Err(parser::Error::UnsupportedFunction(gf)) => {
                // File-handling and volume-handling traffic this client never
                // requested; answer with a negative acknowledgment.
                debug!(%gf, "rejecting unsupported frame");
                self.nack_back(datagram, gf.0);
            }
            Err(parser::Error::ShortFrame(len)) => {
                debug!(len, "rejecting short frame");
                let offending = datagram.data.first().copied().unwrap_or(0xFF);
                self.nack_back(datagram, offending);
            }
            Err(err) => warn!("dropping undecodable frame: {err:?}"),
        }
    }

    fn on_fs_status(&mut self, status: parser::cm::FsStatus, now: Instant) {
        if !self.connected {
            info!(open_files = status.open_files, "file server online");
            self.connected = true;
            self.next_ccm = now;
            if self.state == State::Connecting {
                self.state = State::Idle;
            }
        }
        self.last_status = Some(status.clone());
        // The connect selftest case waits for this broadcast.
        self.deliver(Event::Response(Response::FsStatus(status)), now);
    }

    fn on_response(&mut self, response: Response, now: Instant) {
        let gf = response.group_function();
        let Some(pending) = self.match_pending(MAIN_SOCK, gf) else {
            debug!(%gf, "no pending request, dropping response");
            return;
        };
        match response.tan() {
            Some(tan) if tan != self.expected_tan() => {
                warn!(
                    tan,
                    expected = self.expected_tan(),
                    "transaction number mismatch"
                );
                self.deliver(Event::Failed(pending.op, Failure::TanMismatch), now);
            }
            _ => self.deliver(Event::Response(response), now),
        }
    }

    fn on_nack(&mut self, decoded: parser::ack::Ack, now: Instant) {
        warn!(
            offending = decoded.offending,
            pgn = decoded.pgn,
            "server negatively acknowledged"
        );
        self.dump_tx_log(false);
        self.state = State::Nacked;
        let had_activity = self.activity.is_some();
        self.fail_all_pending(Failure::Nacked, now);
        if !had_activity {
            self.state = State::Idle;
        }
    }

    /// Applies a transport session event; an abort fails the outstanding
    /// transaction without waiting for its deadline.
    pub fn handle_session_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Aborted(kind) => {
                warn!("transport session aborted: {kind:?}");
                let had_activity = self.activity.is_some();
                self.fail_all_pending(Failure::Aborted(kind), now);
                if !had_activity {
                    self.state = State::Idle;
                }
            }
            other => debug!("transport session event: {other:?}"),
        }
    }

    /// Expires pending requests, keeps the connection alive and runs the
    /// activity watchdog.
    pub fn tick(&mut self, now: Instant) {
        let mut expired = Vec::new();
        for slot in &mut self.pending {
            if let Some(pending) = slot {
                if pending.deadline <= now {
                    expired.push(pending.op);
                    *slot = None;
                }
            }
        }
        for op in expired {
            warn!(?op, "request timed out");
            self.deliver(Event::TimedOut(op), now);
        }

        if self.connected && now >= self.next_ccm {
            match cm::cc_maintenance(VERSION_NUMBER) {
                Ok(frame) => self.transmit(frame, now),
                Err(err) => warn!("cannot build maintenance message: {err}"),
            }
            self.next_ccm = now + CCM_INTERVAL;
        }

        if let Some(mut activity) = self.activity.take() {
            match activity.on_tick(self, now) {
                Flow::Continue => self.activity = Some(activity),
                Flow::Done => {}
            }
        }
    }

    /// The next instant at which [`Engine::tick`] has work to do.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        let mut deadline = now + Duration::from_secs(1);
        for pending in self.pending.iter().flatten() {
            deadline = deadline.min(pending.deadline);
        }
        if self.connected {
            deadline = deadline.min(self.next_ccm);
        }
        if let Some(activity) = &self.activity {
            if let Some(at) = activity.deadline() {
                deadline = deadline.min(at);
            }
        }
        deadline
    }

    // Request senders. Each allocates a transaction number, registers the
    // awaited response and queues the frame.

    pub fn send_properties_req(&mut self, now: Instant) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = cm::get_fs_properties_req(tan)?;
        self.register(gf(CommandGroup::ConnectionManagement, cmf::GET_FS_PROPERTIES),
            Op::Properties, now)?;
        self.state = State::Waiting(Op::Properties);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_volume_status_req(
        &mut self,
        mode: VolumeMode,
        name: &str,
        now: Instant,
    ) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = cm::volume_status_req(tan, mode, name)?;
        self.register(gf(CommandGroup::ConnectionManagement, cmf::VOLUME_STATUS),
            Op::VolumeStatus, now)?;
        self.state = State::Waiting(Op::VolumeStatus);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_current_dir_req(&mut self, now: Instant) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = dh::get_current_dir_req(tan)?;
        self.register(gf(CommandGroup::DirectoryHandling, dhf::GET_CURRENT_DIR),
            Op::CurrentDir, now)?;
        self.state = State::Waiting(Op::CurrentDir);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_change_dir_req(&mut self, path: &str, now: Instant) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = dh::change_current_dir_req(tan, path)?;
        self.register(gf(CommandGroup::DirectoryHandling, dhf::CHANGE_CURRENT_DIR),
            Op::ChangeDir, now)?;
        self.state = State::Waiting(Op::ChangeDir);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_open_file_req(&mut self, path: &str, flags: u8, now: Instant) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = fa::open_file_req(tan, flags, path)?;
        self.register(gf(CommandGroup::FileAccess, faf::OPEN_FILE), Op::OpenFile, now)?;
        self.state = State::Waiting(Op::OpenFile);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_seek_file_req(
        &mut self,
        handle: u8,
        mode: SeekMode,
        offset: i32,
        now: Instant,
    ) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = fa::seek_file_req(tan, handle, mode, offset)?;
        self.register(gf(CommandGroup::FileAccess, faf::SEEK_FILE), Op::SeekFile, now)?;
        self.state = State::Waiting(Op::SeekFile);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_read_file_req(
        &mut self,
        handle: u8,
        count: u16,
        report_hidden: bool,
        now: Instant,
    ) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = fa::read_file_req(tan, handle, count, report_hidden)?;
        self.register(gf(CommandGroup::FileAccess, faf::READ_FILE), Op::ReadFile, now)?;
        self.state = State::Waiting(Op::ReadFile);
        self.transmit(frame, now);
        Ok(())
    }

    pub fn send_close_file_req(&mut self, handle: u8, now: Instant) -> io::Result<()> {
        let tan = self.alloc_tan();
        let frame = fa::close_file_req(tan, handle)?;
        self.register(gf(CommandGroup::FileAccess, faf::CLOSE_FILE), Op::CloseFile, now)?;
        self.state = State::Waiting(Op::CloseFile);
        self.transmit(frame, now);
        Ok(())
    }

    /// Fires a close request without awaiting the response. Used by pipeline
    /// unwinding: the handle must not leak even when the session is already
    /// failing.
    pub fn send_close_file_noreply(&mut self, handle: u8, now: Instant) {
        let tan = self.alloc_tan();
        match fa::close_file_req(tan, handle) {
            Ok(frame) => self.transmit(frame, now),
            Err(err) => warn!("cannot build close request: {err}"),
        }
    }

    /// Prints the transmit log, newest last.
    pub fn dmesg(&mut self) {
        self.dump_tx_log(true);
    }

    fn dump_tx_log(&mut self, to_console: bool) {
        let lines: Vec<String> = self
            .tx_log
            .iter()
            .map(|(at, data)| format!("{:?} {}", at, hex(data)))
            .collect();
        for line in lines {
            if to_console {
                self.console.push(line);
            } else {
                debug!("tx {line}");
            }
        }
    }

    fn alloc_tan(&mut self) -> u8 {
        let tan = self.next_tan;
        self.next_tan = self.next_tan.wrapping_add(1);
        tan
    }

    fn register(&mut self, awaits: GroupFunction, op: Op, now: Instant) -> io::Result<()> {
        // Two outstanding requests awaiting the same response function on the
        // same socket cannot be told apart; that is a programming error.
        debug_assert!(
            !self
                .pending
                .iter()
                .flatten()
                .any(|p| p.sock == MAIN_SOCK && p.awaits == awaits),
            "duplicate pending registration for {awaits}"
        );
        let slot = self
            .pending
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or_else(|| io::Error::other("pending-request table full"))?;
        *slot = Some(Pending {
            sock: MAIN_SOCK,
            awaits,
            op,
            deadline: now + REQUEST_TIMEOUT,
            one_shot: true,
        });
        Ok(())
    }

    fn match_pending(&mut self, sock: SockId, awaits: GroupFunction) -> Option<Pending> {
        let index = self
            .pending
            .iter()
            .position(|s| s.map(|p| p.sock == sock && p.awaits == awaits).unwrap_or(false))?;
        let pending = self.pending[index]?;
        if pending.one_shot {
            self.pending[index] = None;
        }
        Some(pending)
    }

    fn fail_all_pending(&mut self, failure: Failure, now: Instant) {
        let mut failed = Vec::new();
        for slot in &mut self.pending {
            if let Some(pending) = slot.take() {
                failed.push(pending.op);
            }
        }
        for op in failed {
            self.deliver(Event::Failed(op, failure), now);
        }
    }

    fn deliver(&mut self, event: Event, now: Instant) {
        if let Some(mut activity) = self.activity.take() {
            match activity.on_event(self, event, now) {
                Flow::Continue => self.activity = Some(activity),
                Flow::Done => {}
            }
        } else {
            debug!("no active pipeline for {event:?}");
        }
    }

    fn nack_back(&mut self, datagram: &Datagram, offending: u8) {
        match ack::nack(offending, datagram.src, datagram.pgn) {
            Ok(frame) => self.outbox.push(Outgoing::unicast(datagram.src, PGN_ACK, frame)),
            Err(err) => warn!("cannot build negative acknowledgment: {err}"),
        }
    }

    fn transmit(&mut self, data: Vec<u8>, now: Instant) {
        if self.tx_log.len() == TX_LOG_LEN {
            self.tx_log.pop_front();
        }
        self.tx_log.push_back((now, data.clone()));
        self.outbox.push(Outgoing::unicast(self.server, PGN_CLIENT_TO_FS, data));
    }
}

fn gf(group: CommandGroup, function: u8) -> GroupFunction {
    GroupFunction::new(group, function)
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
