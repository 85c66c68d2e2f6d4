//! Client-side connection status of a live chat session.

use serde::{Deserialize, Serialize};

use std::fmt;

/// WebSocket close code the client sends on deliberate teardown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a connection drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Whether a close code means the connection ended on purpose.
pub fn is_deliberate_close(code: u16) -> bool {
    code == NORMAL_CLOSURE
}

/// Realtime connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}
