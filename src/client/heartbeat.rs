//! Heartbeat monitor — liveness probing over a connection that may die
//! silently.
//!
//! DESIGN
//! ======
//! Pure timing state machine: the agent asks for the next [`deadline`], wakes
//! at it, and calls [`on_tick`]. While idle a tick means "send a ping"; while
//! a ping is outstanding a tick past the grace window means the connection is
//! stale and must be torn down. A `pong` at any point settles the outstanding
//! probe and reschedules.
//!
//! Pausing (tab hidden) clears all deadlines without forgetting that the
//! monitor was running; resuming reschedules a fresh interval so a
//! just-woken tab is never declared stale on sight.

use std::time::Duration;

use tokio::time::Instant;

/// Default probe interval.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default window a probe may stay unanswered before the connection is
/// declared stale.
pub const HEARTBEAT_GRACE: Duration = Duration::from_secs(10);

/// What the agent must do when a deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    SendPing,
    ConnectionStale,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    grace: Duration,
    running: bool,
    paused: bool,
    awaiting_pong: bool,
    deadline: Option<Instant>,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(interval: Duration, grace: Duration) -> Self {
        Self {
            interval,
            grace,
            running: false,
            paused: false,
            awaiting_pong: false,
            deadline: None,
        }
    }

    /// Begin probing; the first ping is due one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.paused = false;
        self.awaiting_pong = false;
        self.deadline = Some(now + self.interval);
    }

    /// Stop probing entirely (connection gone).
    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
        self.awaiting_pong = false;
        self.deadline = None;
    }

    /// Suspend probing while the tab is hidden. Outstanding probes are
    /// forgiven: a background tab must not be torn down for a slow pong.
    pub fn pause(&mut self) {
        if self.running {
            self.paused = true;
            self.awaiting_pong = false;
            self.deadline = None;
        }
    }

    /// Resume probing with a fresh interval.
    pub fn resume(&mut self, now: Instant) {
        if self.running && self.paused {
            self.paused = false;
            self.awaiting_pong = false;
            self.deadline = Some(now + self.interval);
        }
    }

    /// When the agent should next call [`on_tick`], if ever.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Handle a fired deadline. Returns `None` when the deadline has not
    /// actually elapsed (spurious wake) or probing is off.
    pub fn on_tick(&mut self, now: Instant) -> Option<TickAction> {
        if !self.running || self.paused {
            return None;
        }
        let due = self.deadline?;
        if now < due {
            return None;
        }
        if self.awaiting_pong {
            // Grace window exhausted with no pong.
            self.deadline = None;
            Some(TickAction::ConnectionStale)
        } else {
            self.awaiting_pong = true;
            self.deadline = Some(now + self.grace);
            Some(TickAction::SendPing)
        }
    }

    /// Settle the outstanding probe, if any, and schedule the next one.
    pub fn on_pong(&mut self, now: Instant) {
        if self.running && !self.paused && self.awaiting_pong {
            self.awaiting_pong = false;
            self.deadline = Some(now + self.interval);
        }
    }

    #[must_use]
    pub fn awaiting_pong(&self) -> bool {
        self.awaiting_pong
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(HEARTBEAT_INTERVAL, HEARTBEAT_GRACE)
    }
}

#[cfg(test)]
#[path = "heartbeat_test.rs"]
mod tests;
