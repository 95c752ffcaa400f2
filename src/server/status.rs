//! File Server Status beacon scheduling.
//!
//! The status broadcast runs at a 2000 ms cadence while idle and 200 ms while
//! busy. Any change of the status byte makes the beacon fire immediately and
//! keeps the next five messages at the busy cadence regardless of the actual
//! state, so listeners see the flip promptly.

use std::io;
use std::time::{Duration, Instant};

use crate::serializer::cm;

/// Broadcast interval while the status byte is idle.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(2000);
/// Broadcast interval while the status byte reports activity.
pub const BUSY_INTERVAL: Duration = Duration::from_millis(200);
/// Number of fast beacons after a status-byte change.
pub const CHANGE_BURST: u8 = 5;

/// Scheduler state of the periodic status broadcast.
pub struct Beacon {
    last_status: u8,
    burst_left: u8,
    next_at: Instant,
}

impl Beacon {
    /// A beacon that fires on the first tick.
    pub fn new(now: Instant) -> Self {
        Self { last_status: 0, burst_left: 0, next_at: now }
    }

    /// Returns the frame to broadcast if one is due at `now`.
    pub fn tick(
        &mut self,
        now: Instant,
        status: u8,
        open_files: u8,
    ) -> io::Result<Option<Vec<u8>>> {
        if status != self.last_status {
            self.burst_left = CHANGE_BURST;
            self.next_at = now;
        }
        if now < self.next_at {
            return Ok(None);
        }
        let interval = if self.burst_left > 0 {
            self.burst_left -= 1;
            BUSY_INTERVAL
        } else if status != 0 {
            BUSY_INTERVAL
        } else {
            IDLE_INTERVAL
        };
        self.next_at = now + interval;
        self.last_status = status;
        cm::fs_status(status, open_files).map(Some)
    }

    /// When the next broadcast is scheduled.
    pub fn next_deadline(&self) -> Instant {
        self.next_at
    }
}
