//! Connection state machine for one chat session.
//!
//! ```text
//! disconnected --connect--> connecting --open--> connected
//! connecting --failure/close--> disconnected   (retry while budget remains)
//! connected --abnormal close--> disconnected   (retry while budget remains)
//! connected --deliberate close--> disconnected (terminal)
//! ```
//!
//! The machine only decides; the session task owns the connection and the
//! retry timer and acts on the returned [`CloseDecision`].

use std::time::Duration;

use hadiya_types::config::ReconnectConfig;
use hadiya_types::session::{ConnectionStatus, is_deliberate_close};

use super::reconnect::ReconnectPolicy;

/// What to do after the feed went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Schedule attempt `attempt` after `delay`.
    Reconnect { attempt: u32, delay: Duration },
    /// Retry budget used up; stay disconnected until a manual reconnect.
    Exhausted,
    /// Closed on purpose or rejected credentials; do not retry.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct ConnectionState {
    status: ConnectionStatus,
    policy: ReconnectPolicy,
    terminated: bool,
    live_updates_available: bool,
}

impl ConnectionState {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            policy: ReconnectPolicy::new(config),
            terminated: false,
            live_updates_available: true,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Attempts used since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn live_updates_available(&self) -> bool {
        self.live_updates_available
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Enter `connecting`. Returns `false` once the session has been torn down.
    pub fn begin_connect(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        true
    }

    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.policy.reset();
        self.live_updates_available = true;
    }

    /// Transport error. Retry scheduling is left to the close that follows.
    pub fn on_error(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn on_close(&mut self, code: u16) -> CloseDecision {
        self.status = ConnectionStatus::Disconnected;
        if self.terminated || is_deliberate_close(code) {
            return CloseDecision::Stopped;
        }
        self.schedule_retry()
    }

    /// The handshake did not complete.
    pub fn on_connect_failed(&mut self, unauthorized: bool) -> CloseDecision {
        self.status = ConnectionStatus::Disconnected;
        if self.terminated || unauthorized {
            return CloseDecision::Stopped;
        }
        self.schedule_retry()
    }

    /// Manual reconnect: fresh retry budget.
    pub fn reset_retries(&mut self) {
        self.policy.reset();
        self.live_updates_available = true;
    }

    /// Deliberate teardown. Every later close is `Stopped`.
    pub fn terminate(&mut self) {
        self.terminated = true;
        self.status = ConnectionStatus::Disconnected;
    }

    fn schedule_retry(&mut self) -> CloseDecision {
        match self.policy.next_attempt() {
            Some((attempt, delay)) => CloseDecision::Reconnect { attempt, delay },
            None => {
                self.live_updates_available = false;
                CloseDecision::Exhausted
            }
        }
    }
}
