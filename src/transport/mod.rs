//! Datagram transport abstraction.
//!
//! The protocol core consumes whole file-server messages; fragmentation and
//! reassembly for payloads above 8 bytes belong to the host CAN stack behind
//! this interface. An endpoint delivers received datagrams, sends unicast
//! replies and broadcasts, and surfaces per-session transmit outcomes through
//! an error-queue drain.

pub mod mem;

use std::io;

use async_trait::async_trait;

/// J1939 source address of a node.
pub type Addr = u8;

/// Identifier of a local socket, used to demultiplex awaited responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SockId(pub u8);

/// The main request/response socket of a role.
pub const MAIN_SOCK: SockId = SockId(0);

/// A whole received message.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub src: Addr,
    pub pgn: u32,
    pub data: Vec<u8>,
}

/// Destination of one outgoing message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dest {
    Unicast(Addr),
    Broadcast,
}

/// One message queued by a role for transmission on its endpoint.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub dest: Dest,
    pub pgn: u32,
    pub data: Vec<u8>,
}

impl Outgoing {
    pub fn unicast(dst: Addr, pgn: u32, data: Vec<u8>) -> Self {
        Self { dest: Dest::Unicast(dst), pgn, data }
    }

    pub fn broadcast(pgn: u32, data: Vec<u8>) -> Self {
        Self { dest: Dest::Broadcast, pgn, data }
    }
}

/// Result of transport operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Transport failures.
#[derive(Debug)]
pub enum Error {
    /// The peer mailbox or the local endpoint is gone.
    Closed,
    /// The underlying host transport failed.
    IO(io::Error),
}

/// Locally observed outcome of a transmit session, one record per event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was queued for transmission.
    Scheduled,
    /// All frames left the controller.
    Sent,
    /// The peer acknowledged the transfer.
    Acked,
    /// The session was aborted before completion.
    Aborted(AbortKind),
}

/// Local classification of a J1939 session abort code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AbortKind {
    /// The peer stopped responding mid-session.
    Timeout,
    /// The peer is already busy with another session.
    Busy,
    /// The peer ran out of session resources.
    Resources,
    /// Any other abort reason, carrying the raw code.
    Other(u8),
}

impl AbortKind {
    /// Maps a raw J1939 connection abort reason to a local kind.
    pub fn from_raw(code: u8) -> Self {
        match code {
            1 => AbortKind::Busy,
            2 => AbortKind::Resources,
            3 => AbortKind::Timeout,
            other => AbortKind::Other(other),
        }
    }
}

/// One datagram endpoint owned by a role.
#[async_trait]
pub trait Endpoint: Send {
    /// Local source address of this endpoint.
    fn addr(&self) -> Addr;

    /// Sends a message to one peer.
    async fn send_reply(&self, dst: Addr, pgn: u32, data: Vec<u8>) -> Result<()>;

    /// Sends a message to every other node.
    async fn broadcast(&self, pgn: u32, data: Vec<u8>) -> Result<()>;

    /// Waits for the next message from any peer.
    async fn recv_any(&mut self) -> Result<Datagram>;

    /// Drains the error queue of locally observed session events.
    fn drain_error_queue(&mut self) -> Vec<SessionEvent>;
}
