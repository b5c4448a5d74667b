//! Error types for the planner-link client.

use thiserror::Error;

/// Main error type for planner-link operations.
#[derive(Error, Debug)]
pub enum PlannerLinkError {
    /// An HTTP request could not be performed (DNS, TCP, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The push channel failed or was refused by the server.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A server payload could not be decoded into the expected structure.
    #[error("Failed to decode server payload: {0}")]
    Decode(String),

    /// A message-submission call was rejected by the server.
    #[error("Send failed: {0}")]
    Send(String),

    /// Invalid client configuration (missing base URL, unparseable endpoint).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation that needs an owned connection was called while the
    /// dispatcher is inactive.
    #[error("Dispatcher is not active: {0}")]
    Inactive(String),

    /// The notification store could not read or write its backing storage.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for planner-link operations.
pub type Result<T> = std::result::Result<T, PlannerLinkError>;
