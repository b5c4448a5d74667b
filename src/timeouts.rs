//! Timeout configuration for planner-link client operations.
//!
//! Centralizes timeout management for the HTTP request/response calls and
//! the push-channel connection handshake. The push channel itself carries no
//! read timeout: an idle event stream is a healthy event stream.

use std::time::Duration;

/// Timeout configuration for planner-link client operations.
///
/// # Examples
///
/// ```rust
/// use planner_link::PlannerLinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = PlannerLinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = PlannerLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(30))
///     .request_timeout(Duration::from_secs(60))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PlannerLinkTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Applies to both the push channel and request/response calls.
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Total timeout for request/response calls (`send_message`, `get_status`).
    /// Does not apply to the push channel.
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for PlannerLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PlannerLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> PlannerLinkTimeoutsBuilder {
        PlannerLinkTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Timeouts optimized for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Builder for creating custom [`PlannerLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct PlannerLinkTimeoutsBuilder {
    timeouts: PlannerLinkTimeouts,
}

impl PlannerLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: PlannerLinkTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the request/response timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Set the request/response timeout in seconds.
    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> PlannerLinkTimeouts {
        self.timeouts
    }
}
