//! In-process datagram hub.
//!
//! Connects client and server roles running in the same process: every
//! endpoint gets a mailbox keyed by its source address, unicast sends post to
//! one mailbox, broadcasts post to all others. Sends to a vanished peer
//! surface as an aborted session on the error queue, the same way a dead bus
//! peer would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{AbortKind, Addr, Datagram, Endpoint, Error, Result, SessionEvent};

type Mailboxes = Arc<Mutex<HashMap<Addr, UnboundedSender<Datagram>>>>;

/// The shared bus all in-process endpoints attach to.
#[derive(Clone, Default)]
pub struct Hub {
    mailboxes: Mailboxes,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new endpoint with the given source address. A second
    /// endpoint on the same address replaces the first, which then only
    /// observes aborted sessions.
    pub fn endpoint(&self, addr: Addr) -> MemEndpoint {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes
            .lock()
            .expect("mailbox registry poisoned")
            .insert(addr, tx);
        MemEndpoint {
            addr,
            mailboxes: Arc::clone(&self.mailboxes),
            rx,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Detaches an address, simulating a peer falling off the bus.
    pub fn drop_endpoint(&self, addr: Addr) {
        self.mailboxes.lock().expect("mailbox registry poisoned").remove(&addr);
    }
}

/// One attached endpoint.
pub struct MemEndpoint {
    addr: Addr,
    mailboxes: Mailboxes,
    rx: UnboundedReceiver<Datagram>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

#[async_trait]
impl Endpoint for MemEndpoint {
    fn addr(&self) -> Addr {
        self.addr
    }

    async fn send_reply(&self, dst: Addr, pgn: u32, data: Vec<u8>) -> Result<()> {
        let datagram = Datagram { src: self.addr, pgn, data };
        let sender = {
            let mailboxes = self.mailboxes.lock().expect("mailbox registry poisoned");
            mailboxes.get(&dst).cloned()
        };
        match sender.and_then(|tx| tx.send(datagram).ok()) {
            Some(()) => Ok(()),
            // The peer is gone; the session aborts instead of failing the
            // send, matching the error-queue contract of the host stack.
            None => {
                self.push_event(SessionEvent::Aborted(AbortKind::Timeout));
                Ok(())
            }
        }
    }

    async fn broadcast(&self, pgn: u32, data: Vec<u8>) -> Result<()> {
        let targets: Vec<UnboundedSender<Datagram>> = {
            let mailboxes = self.mailboxes.lock().expect("mailbox registry poisoned");
            mailboxes
                .iter()
                .filter(|(addr, _)| **addr != self.addr)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in targets {
            let _ = tx.send(Datagram { src: self.addr, pgn, data: data.clone() });
        }
        Ok(())
    }

    async fn recv_any(&mut self) -> Result<Datagram> {
        self.rx.recv().await.ok_or(Error::Closed)
    }

    fn drain_error_queue(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().expect("event queue poisoned"))
    }
}

impl MemEndpoint {
    fn push_event(&self, event: SessionEvent) {
        self.events.lock().expect("event queue poisoned").push(event);
    }
}
