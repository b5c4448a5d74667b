use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the push channel.
///
/// Transitions:
/// - `Disconnected` -> `Connecting` on a `connect()` call
/// - `Connecting` -> `Connected` on transport open
/// - `Connecting` | `Connected` -> `Error` on transport failure
/// - any state -> `Disconnected` on explicit `disconnect()`
///
/// No state is terminal; a reconnect always re-enters at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Returns true only for the `Connected` state.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Stable lowercase name, matching the wire-facing vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
