//! # planner-link
//!
//! Client SDK for the planner push-notification service.
//!
//! The service pushes two classes of events over one Server-Sent Events
//! channel: broadcast messages on the default channel (addressed to every
//! listener) and personal messages on a named channel whose name equals a
//! recipient identifier. This crate provides:
//!
//! - [`EventStreamClient`]: owns the push channel, demultiplexes and
//!   classifies messages, exposes connect/disconnect plus message, status,
//!   and error subscriptions, and carries the request/response calls
//!   (`send_message`, `get_status`).
//! - [`NotificationStore`]: a durable, ordered log of received messages
//!   with read/unread state, persisted through a pluggable
//!   [`KeyValueStore`] and independent of the channel lifecycle.
//! - [`Dispatcher`]: the per-session owner of one client, bridging channel
//!   events to the store and to a user-facing [`AlertSink`], with an
//!   optional bounded-backoff [`ReconnectPolicy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use planner_link::{
//!     AlertCategory, AlertSink, Dispatcher, DispatcherConfig, MemoryKeyValueStore,
//!     NotificationStore,
//! };
//!
//! struct StdoutAlerts;
//! impl AlertSink for StdoutAlerts {
//!     fn notify(&self, text: &str, category: AlertCategory) {
//!         println!("[{}] {}", category.as_str(), text);
//!     }
//! }
//!
//! # async fn example() -> planner_link::Result<()> {
//! let store = Arc::new(NotificationStore::new(Arc::new(MemoryKeyValueStore::new())));
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::new("http://localhost:8002"),
//!     Arc::clone(&store),
//!     Some(Arc::new(StdoutAlerts)),
//! );
//!
//! // Once a session identity is known:
//! dispatcher.activate("user123")?;
//!
//! // Later, from the UI layer:
//! let unread = store.unread_count();
//! println!("{} unread notifications", unread);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod models;
pub mod sse;
pub mod store;
pub mod stream;
pub mod subscribers;
pub mod timeouts;

pub use dispatch::{AlertCategory, AlertSink, Dispatcher, DispatcherConfig, ReconnectPolicy};
pub use error::{PlannerLinkError, Result};
pub use models::{
    ConnectionState, Delivery, PushMessage, SendAck, SendMessageRequest, StoredNotification,
    StreamError, StreamErrorKind, WireMessage,
};
pub use sse::{SseFrame, SseFrameParser};
pub use store::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, NotificationStore, DEFAULT_STORE_KEY,
};
pub use stream::{EventStreamClient, EventStreamClientBuilder, HostRewrite};
pub use subscribers::Subscription;
pub use timeouts::{PlannerLinkTimeouts, PlannerLinkTimeoutsBuilder};
