//! Data models for the planner-link client library.
//!
//! Defines the wire-level message shape, the classified domain message,
//! connection lifecycle states, channel error events, and the persisted
//! notification record.

pub mod connection_state;
pub mod push_message;
pub mod send_message;
pub mod stored_notification;
pub mod stream_error;

pub use connection_state::ConnectionState;
pub use push_message::{Delivery, PushMessage, WireMessage};
pub use send_message::{SendAck, SendMessageRequest};
pub use stored_notification::StoredNotification;
pub use stream_error::{StreamError, StreamErrorKind};
