//! The file-server client: request/response engine, command pipelines,
//! selftest harness and the interactive command surface.

pub mod commands;
pub mod engine;
pub mod repl;
pub mod selftest;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::parser;
use crate::protocol::ErrorCode;
use crate::transport::{AbortKind, Dest, Endpoint};

pub use engine::Engine;

/// Operations the client performs against the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    Properties,
    VolumeStatus,
    CurrentDir,
    ChangeDir,
    OpenFile,
    SeekFile,
    ReadFile,
    CloseFile,
}

impl Op {
    pub fn describe(self) -> &'static str {
        match self {
            Op::Connect => "connect",
            Op::Properties => "get file server properties",
            Op::VolumeStatus => "volume status",
            Op::CurrentDir => "get current directory",
            Op::ChangeDir => "change current directory",
            Op::OpenFile => "open file",
            Op::SeekFile => "seek file",
            Op::ReadFile => "read file",
            Op::CloseFile => "close file",
        }
    }
}

/// Why a transaction or pipeline failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No response arrived before the request deadline.
    TimedOut,
    /// The server negatively acknowledged the request.
    Nacked,
    /// The response transaction number does not match the issued one.
    TanMismatch,
    /// The transport reported an aborted session.
    Aborted(AbortKind),
    /// The server answered with a non-success code.
    Remote(ErrorCode),
    /// A local I/O step of the pipeline failed.
    Local,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::TimedOut => write!(f, "timed out"),
            Failure::Nacked => write!(f, "negative acknowledgment"),
            Failure::TanMismatch => {
                write!(f, "error code: {}", ErrorCode::TanError)
            }
            Failure::Aborted(kind) => write!(f, "transport session aborted ({kind:?})"),
            Failure::Remote(code) => write!(f, "error code: {code}"),
            Failure::Local => write!(f, "local I/O failure"),
        }
    }
}

/// Top-level client state. Pipelines own their substate; this coarse view is
/// observed by the selftest harness.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Waiting for the first File Server Status broadcast.
    Connecting,
    Idle,
    /// The server negatively acknowledged the last transmission.
    Nacked,
    /// The selftest harness is walking its cases.
    Selftest,
    /// A request is outstanding.
    Waiting(Op),
    /// The last operation completed.
    Done(Op),
    /// The last operation failed.
    Failed(Op, Failure),
    /// A pipeline is between requests.
    Active(Op),
}

/// One event delivered to the active pipeline.
#[derive(Debug)]
pub enum Event {
    /// A matched response.
    Response(parser::Response),
    /// A pending request expired.
    TimedOut(Op),
    /// The transaction failed before a usable response arrived.
    Failed(Op, Failure),
}

/// Continue-or-done outcome of feeding an event to a pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// A command accepted by the interactive surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Dmesg,
    Selftest,
    Ls { long: bool, path: String },
    Cd { path: String },
    Pwd,
    Get { remote: String, local: Option<PathBuf> },
}

/// The pipeline currently driving the engine.
pub enum Activity {
    Cd(commands::CdPipeline),
    Pwd(commands::PwdPipeline),
    Ls(commands::LsPipeline),
    Get(commands::GetPipeline),
    Selftest(selftest::Selftest),
}

impl Activity {
    pub fn start(&mut self, engine: &mut Engine, now: std::time::Instant) -> Flow {
        match self {
            Activity::Cd(p) => p.start(engine, now),
            Activity::Pwd(p) => p.start(engine, now),
            Activity::Ls(p) => p.start(engine, now),
            Activity::Get(p) => p.start(engine, now),
            Activity::Selftest(p) => p.start(engine, now),
        }
    }

    pub fn on_event(&mut self, engine: &mut Engine, event: Event, now: std::time::Instant) -> Flow {
        match self {
            Activity::Cd(p) => p.on_event(engine, event, now),
            Activity::Pwd(p) => p.on_event(engine, event, now),
            Activity::Ls(p) => p.on_event(engine, event, now),
            Activity::Get(p) => p.on_event(engine, event, now),
            Activity::Selftest(p) => p.on_event(engine, event, now),
        }
    }

    pub fn on_tick(&mut self, engine: &mut Engine, now: std::time::Instant) -> Flow {
        match self {
            Activity::Selftest(p) => p.on_tick(engine, now),
            _ => Flow::Continue,
        }
    }

    /// The watchdog deadline of the activity, if it keeps one.
    pub fn deadline(&self) -> Option<std::time::Instant> {
        match self {
            Activity::Selftest(p) => Some(p.case_deadline()),
            _ => None,
        }
    }
}

/// Drives the client engine over an endpoint, feeding it command lines from
/// the interactive surface.
///
/// Returns the process exit code: zero on a clean `exit`/`quit`, and in
/// non-interactive mode the outcome of the selftest run.
pub async fn run<E: Endpoint>(
    mut engine: Engine,
    mut endpoint: E,
    mut lines: UnboundedReceiver<String>,
    interactive: bool,
) -> crate::transport::Result<i32> {
    loop {
        let now = std::time::Instant::now();
        engine.tick(now);
        for event in endpoint.drain_error_queue() {
            engine.handle_session_event(event, now);
        }
        for out in engine.take_outbox() {
            match out.dest {
                Dest::Unicast(addr) => endpoint.send_reply(addr, out.pgn, out.data).await?,
                Dest::Broadcast => endpoint.broadcast(out.pgn, out.data).await?,
            }
        }
        for line in engine.take_console() {
            println!("{line}");
        }
        if !interactive {
            if let Some(failures) = engine.selftest_failures() {
                return Ok(if failures == 0 { 0 } else { 1 });
            }
        }
        let deadline = tokio::time::Instant::from_std(engine.next_deadline(now));
        tokio::select! {
            result = endpoint.recv_any() => {
                let datagram = result?;
                engine.handle_datagram(&datagram, std::time::Instant::now());
            }
            line = lines.recv() => {
                let Some(line) = line else { return Ok(0) };
                match repl::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Exit)) => return Ok(0),
                    Ok(Some(Command::Help)) => println!("{}", repl::HELP),
                    Ok(Some(command)) => engine.submit(command, std::time::Instant::now()),
                    Err(message) => warn!("{message}"),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }
    }
}
