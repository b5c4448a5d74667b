//! Session-scoped owner of one push-channel client.
//!
//! [`Dispatcher`] is the explicit service object that replaces the ambient
//! provider of the original dashboard: constructed when the application
//! starts, activated once a session's recipient identifier is known, and
//! deactivated (disconnecting its channel first) when the session ends.
//! While active it bridges channel events to the [`NotificationStore`] and
//! to a user-facing [`AlertSink`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{PlannerLinkError, Result};
use crate::models::{ConnectionState, SendAck, StreamErrorKind};
use crate::store::NotificationStore;
use crate::stream::{EventStreamClient, HostRewrite};
use crate::subscribers::Subscription;
use crate::timeouts::PlannerLinkTimeouts;

/// Visual category of a user-facing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    Success,
    Error,
    Warning,
    Info,
}

impl AlertCategory {
    /// Map a message category string to an alert category.
    /// Case-insensitive; anything unrecognized is `Info`.
    pub fn from_category(category: &str) -> Self {
        match category.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// User-facing alert surface (toast layer or equivalent).
/// Fire-and-forget; no return value is consumed.
pub trait AlertSink: Send + Sync {
    fn notify(&self, text: &str, category: AlertCategory);
}

/// Bounded exponential-backoff reconnect policy.
///
/// Owned by the dispatcher, never by the transport: the channel itself
/// stays manual-retry-only. Disabled unless set on [`DispatcherConfig`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts per failure.
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles per attempt.
    pub initial_delay: Duration,
    /// Upper bound for the backoff delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for attempt `attempt` (zero-based), capped at
    /// `max_delay`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Base URL of the planner notification service.
    pub base_url: String,
    /// Raise user-facing alerts for messages, status transitions, and
    /// errors. When false, the alert surface is never called.
    pub show_alerts: bool,
    /// Category used by `send_message` when the caller passes none.
    pub default_send_category: String,
    /// Timeout configuration forwarded to the owned client.
    pub timeouts: PlannerLinkTimeouts,
    /// Explicit endpoint host substitutions forwarded to the owned client.
    pub host_rewrites: Vec<HostRewrite>,
    /// Optional reconnect policy; `None` means manual reconnect only.
    pub reconnect: Option<ReconnectPolicy>,
}

impl DispatcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            show_alerts: true,
            default_send_category: "frontend".to_string(),
            timeouts: PlannerLinkTimeouts::default(),
            host_rewrites: Vec::new(),
            reconnect: None,
        }
    }
}

/// Cancellation flag for the reconnect task: a level (so a signal sent
/// while the task is between waits is not lost) plus a wakeup.
struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct ActiveSession {
    client: EventStreamClient,
    recipient_id: String,
    bridges: Vec<Subscription>,
    cancel: Arc<CancelFlag>,
}

/// Owner of one [`EventStreamClient`] per active session.
pub struct Dispatcher {
    config: DispatcherConfig,
    store: Arc<NotificationStore>,
    alerts: Option<Arc<dyn AlertSink>>,
    active: Mutex<Option<ActiveSession>>,
}

impl Dispatcher {
    /// Create an inactive dispatcher. Pass `None` for `alerts` when there
    /// is no user-facing surface (alerting is then disabled regardless of
    /// `show_alerts`).
    pub fn new(
        config: DispatcherConfig,
        store: Arc<NotificationStore>,
        alerts: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            config,
            store,
            alerts,
            active: Mutex::new(None),
        }
    }

    /// Returns true while a session owns a live client.
    pub fn is_active(&self) -> bool {
        self.active.lock().expect("dispatcher state poisoned").is_some()
    }

    /// The active session's recipient identifier, if any.
    pub fn recipient_id(&self) -> Option<String> {
        self.active
            .lock()
            .expect("dispatcher state poisoned")
            .as_ref()
            .map(|session| session.recipient_id.clone())
    }

    /// Transition to active for `recipient_id`: build a client scoped to
    /// the identifier, wire it to the store and alert surface, and open
    /// the channel. An existing session is torn down first. Requires a
    /// running tokio runtime.
    pub fn activate(&self, recipient_id: impl Into<String>) -> Result<()> {
        let recipient_id = recipient_id.into();
        self.deactivate();

        log::info!("[DISPATCH] Activating for recipient '{}'", recipient_id);
        let mut builder = EventStreamClient::builder()
            .base_url(self.config.base_url.clone())
            .recipient_id(recipient_id.clone())
            .timeouts(self.config.timeouts.clone());
        for rule in &self.config.host_rewrites {
            builder = builder.rewrite_host(rule.from.clone(), rule.to.clone());
        }
        let client = builder.build()?;

        let cancel = Arc::new(CancelFlag::new());
        let bridges = self.wire_bridges(&client, &recipient_id, &cancel);
        client.connect();

        let mut active = self.active.lock().expect("dispatcher state poisoned");
        *active = Some(ActiveSession {
            client,
            recipient_id,
            bridges,
            cancel,
        });
        Ok(())
    }

    /// Transition back to inactive: cancel any reconnect task, drop the
    /// event bridges, and disconnect the owned client before discarding
    /// it. No-op while inactive.
    pub fn deactivate(&self) {
        let session = self.active.lock().expect("dispatcher state poisoned").take();
        let Some(session) = session else {
            return;
        };
        log::info!(
            "[DISPATCH] Deactivating session for '{}'",
            session.recipient_id
        );
        session.cancel.cancel();
        // Disconnect while the bridges are still wired, so the final
        // `Disconnected` transition reaches the alert surface.
        session.client.disconnect();
        for bridge in &session.bridges {
            bridge.unsubscribe();
        }
    }

    /// Pass-through to the owned client. Fails with
    /// [`PlannerLinkError::Inactive`] when no client is owned.
    pub async fn send_message(&self, text: &str, category: Option<&str>) -> Result<SendAck> {
        let client = self.owned_client()?;
        let category = category.unwrap_or(&self.config.default_send_category);
        client.send_message(text, category).await
    }

    /// Pass-through to the owned client. Fails with
    /// [`PlannerLinkError::Inactive`] when no client is owned.
    pub async fn get_status(&self) -> Result<serde_json::Value> {
        let client = self.owned_client()?;
        client.get_status().await
    }

    /// Current channel state, `Disconnected` while inactive.
    pub fn connection_state(&self) -> ConnectionState {
        self.active
            .lock()
            .expect("dispatcher state poisoned")
            .as_ref()
            .map(|session| session.client.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn owned_client(&self) -> Result<EventStreamClient> {
        self.active
            .lock()
            .expect("dispatcher state poisoned")
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or_else(|| {
                PlannerLinkError::Inactive(
                    "no event stream is owned; call activate() first".into(),
                )
            })
    }

    /// Register the three bridge subscriptions on a freshly built client.
    fn wire_bridges(
        &self,
        client: &EventStreamClient,
        recipient_id: &str,
        cancel: &Arc<CancelFlag>,
    ) -> Vec<Subscription> {
        let mut bridges = Vec::with_capacity(3);

        // Message bridge: persist, then alert with a source tag.
        let store = Arc::clone(&self.store);
        let alerts = self.alerts.clone();
        let show_alerts = self.config.show_alerts;
        bridges.push(client.subscribe_message(move |message| {
            store.add(message.clone());
            if !show_alerts {
                return;
            }
            let Some(alerts) = &alerts else { return };
            let text = if message.text.is_empty() {
                "New message received"
            } else {
                message.text.as_str()
            };
            let tag = if message.is_broadcast() {
                " (Global)"
            } else {
                " (Personal)"
            };
            alerts.notify(
                &format!("{}{}", text, tag),
                AlertCategory::from_category(&message.category),
            );
        }));

        // Status bridge: one distinct alert per transition, plus the
        // reconnect trigger on channel failure.
        let alerts = self.alerts.clone();
        let show_alerts = self.config.show_alerts;
        let recipient = recipient_id.to_string();
        let reconnect = self.config.reconnect.clone();
        let reconnect_client = client.clone();
        let reconnect_cancel = Arc::clone(cancel);
        let reconnecting = Arc::new(AtomicBool::new(false));
        bridges.push(client.subscribe_status(move |state| {
            if show_alerts {
                if let Some(alerts) = &alerts {
                    match state {
                        ConnectionState::Connecting => {
                            alerts.notify("Connecting to server...", AlertCategory::Info)
                        }
                        ConnectionState::Connected => alerts.notify(
                            &format!(
                                "Connected to server, listening for events: {}",
                                recipient
                            ),
                            AlertCategory::Success,
                        ),
                        ConnectionState::Error => {
                            alerts.notify("Connection error", AlertCategory::Error)
                        }
                        ConnectionState::Disconnected => {
                            alerts.notify("Disconnected from server", AlertCategory::Info)
                        }
                    }
                }
            }

            if *state == ConnectionState::Error {
                if let Some(policy) = &reconnect {
                    spawn_reconnect(
                        policy.clone(),
                        reconnect_client.clone(),
                        Arc::clone(&reconnect_cancel),
                        Arc::clone(&reconnecting),
                    );
                }
            }
        }));

        // Error bridge: map kinds to human-readable alert texts.
        let alerts = self.alerts.clone();
        let show_alerts = self.config.show_alerts;
        bridges.push(client.subscribe_error(move |error| {
            log::warn!("[DISPATCH] Channel error: {}", error);
            if !show_alerts {
                return;
            }
            let Some(alerts) = &alerts else { return };
            let text = match error.kind {
                StreamErrorKind::Connection => "Failed to connect to server",
                StreamErrorKind::Parse => "Failed to parse server message",
                StreamErrorKind::Send => "Failed to send message",
                // Kinds added later fall back to a generic alert.
                #[allow(unreachable_patterns)]
                _ => "An error occurred",
            };
            alerts.notify(text, AlertCategory::Error);
        }));

        bridges
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Guarantee no orphaned transport survives the owner.
        self.deactivate();
    }
}

/// Run one bounded-backoff reconnect sequence, unless one is already
/// running for this session.
fn spawn_reconnect(
    policy: ReconnectPolicy,
    client: EventStreamClient,
    cancel: Arc<CancelFlag>,
    reconnecting: Arc<AtomicBool>,
) {
    if cancel.is_cancelled() || reconnecting.swap(true, Ordering::SeqCst) {
        return;
    }

    tokio::spawn(async move {
        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for(attempt);
            log::info!(
                "[DISPATCH] Reconnect attempt {}/{} in {:?}",
                attempt + 1,
                policy.max_attempts,
                delay
            );
            tokio::select! {
                _ = cancel.notify.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            if client.is_connected() {
                break;
            }

            client.connect();

            // Let the attempt settle before judging it.
            tokio::select! {
                _ = cancel.notify.notified() => {}
                _ = tokio::time::sleep(policy.initial_delay) => {}
            }
            if cancel.is_cancelled() || client.is_connected() {
                break;
            }
        }
        reconnecting.store(false, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_category_mapping() {
        assert_eq!(AlertCategory::from_category("success"), AlertCategory::Success);
        assert_eq!(AlertCategory::from_category("SUCCESS"), AlertCategory::Success);
        assert_eq!(AlertCategory::from_category("error"), AlertCategory::Error);
        assert_eq!(AlertCategory::from_category("Warning"), AlertCategory::Warning);
        assert_eq!(AlertCategory::from_category("info"), AlertCategory::Info);
        assert_eq!(AlertCategory::from_category("anything-else"), AlertCategory::Info);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(9), Duration::from_millis(350));
    }

    #[test]
    fn test_config_defaults() {
        let config = DispatcherConfig::new("http://localhost:8002");
        assert!(config.show_alerts);
        assert_eq!(config.default_send_category, "frontend");
        assert!(config.reconnect.is_none());
        assert!(config.host_rewrites.is_empty());
    }
}
