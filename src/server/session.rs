//! Per-client session state keyed by J1939 source address.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::path::IsobusPath;
use crate::transport::Addr;

/// Idle time after which a client is evicted and its resources released.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(6000);

/// Capacity of the client table.
pub const MAX_CLIENTS: usize = 16;

/// One connected client.
pub struct ClientSession {
    pub addr: Addr,
    pub last_received: Instant,
    /// Absolute current directory; set lazily to the default volume root the
    /// first time an operation needs it.
    pub current_dir: Option<IsobusPath>,
}

/// The bounded client table.
#[derive(Default)]
pub struct SessionTable {
    clients: Vec<ClientSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get_mut(&mut self, addr: Addr) -> Option<&mut ClientSession> {
        self.clients.iter_mut().find(|c| c.addr == addr)
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.clients.iter().any(|c| c.addr == addr)
    }

    /// Refreshes the idle timer of a client, creating the session on first
    /// contact. Returns `None` when the table is full.
    pub fn touch(&mut self, addr: Addr, now: Instant) -> Option<&mut ClientSession> {
        if let Some(at) = self.clients.iter().position(|c| c.addr == addr) {
            self.clients[at].last_received = now;
            return Some(&mut self.clients[at]);
        }
        if self.clients.len() >= MAX_CLIENTS {
            warn!(addr, "client table full, dropping newcomer");
            return None;
        }
        info!(addr, "new client connected");
        self.clients.push(ClientSession { addr, last_received: now, current_dir: None });
        self.clients.last_mut()
    }

    /// Removes every client idle past [`CLIENT_TIMEOUT`] and returns their
    /// addresses so the caller can release handles and volume references.
    pub fn evict_idle(&mut self, now: Instant) -> Vec<Addr> {
        let mut evicted = Vec::new();
        self.clients.retain(|c| {
            if now.duration_since(c.last_received) > CLIENT_TIMEOUT {
                info!(addr = c.addr, "evicting idle client");
                evicted.push(c.addr);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// The next instant at which an eviction could become due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.clients.iter().map(|c| c.last_received + CLIENT_TIMEOUT).min()
    }
}
