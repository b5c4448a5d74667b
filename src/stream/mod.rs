//! Push-channel client for the planner notification service.
//!
//! [`EventStreamClient`] owns at most one live SSE channel to the configured
//! endpoint, optionally scoped to a recipient identifier, and turns raw
//! frames into classified [`PushMessage`]s delivered to subscriber
//! callbacks. The channel is read by a background task
//! ([`reader::sse_reader_loop`]) owned by the client; `connect()` spawns it
//! and `disconnect()` signals it to stop.

pub(crate) mod reader;

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{PlannerLinkError, Result};
use crate::models::{ConnectionState, PushMessage, SendAck, SendMessageRequest, StreamError};
use crate::subscribers::{EventRegistries, Subscription};
use crate::timeouts::PlannerLinkTimeouts;

/// One explicit host substitution rule for endpoint resolution.
///
/// The planner deployment publishes its container-internal hostname in some
/// configurations; a client outside that network can opt into rewriting it
/// to a reachable host. There is no implicit rewriting: no rule, no
/// substitution, and a matching rule logs loudly before it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    /// Substring of the endpoint to replace (typically the hostname).
    pub from: String,
    /// Replacement text.
    pub to: String,
}

impl HostRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// State owned by the connection mutex.
struct ConnState {
    state: ConnectionState,
    /// Bumped on every connect/disconnect; tags the reader task generation.
    epoch: u64,
    close_tx: Option<oneshot::Sender<()>>,
    reader: Option<JoinHandle<()>>,
}

pub(crate) struct ClientInner {
    pub(crate) base_url: String,
    pub(crate) recipient_id: Option<String>,
    /// Client for request/response calls, with a total request timeout.
    pub(crate) http: reqwest::Client,
    /// Client for the push channel: connect timeout only. A total timeout
    /// here would tear down a healthy idle stream.
    pub(crate) stream_http: reqwest::Client,
    pub(crate) registries: EventRegistries,
    conn: Mutex<ConnState>,
}

impl ClientInner {
    /// Apply a channel-driven state transition if `epoch` is still current.
    pub(crate) fn transition_if_current(&self, epoch: u64, state: ConnectionState) -> bool {
        let mut conn = self.conn.lock().expect("connection state poisoned");
        if conn.epoch != epoch {
            return false;
        }
        conn.state = state;
        true
    }
}

/// Client for the planner push-notification service.
///
/// Cheap to clone; all clones share one connection.
///
/// # Examples
///
/// ```rust,no_run
/// use planner_link::EventStreamClient;
///
/// # async fn example() -> planner_link::Result<()> {
/// let client = EventStreamClient::builder()
///     .base_url("http://localhost:8002")
///     .recipient_id("user123")
///     .build()?;
///
/// let _messages = client.subscribe_message(|msg| {
///     println!("{}: {}", msg.category, msg.text);
/// });
///
/// client.connect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventStreamClient {
    inner: Arc<ClientInner>,
}

impl EventStreamClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> EventStreamClientBuilder {
        EventStreamClientBuilder::new()
    }

    /// The resolved endpoint this client talks to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The recipient identifier for the named channel, if one is configured.
    /// Without it, only broadcast messages are ever produced.
    pub fn recipient_id(&self) -> Option<&str> {
        self.inner.recipient_id.as_deref()
    }

    /// Current lifecycle state of the push channel.
    pub fn state(&self) -> ConnectionState {
        self.inner.conn.lock().expect("connection state poisoned").state
    }

    /// Returns true while the push channel is open.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Open the push channel.
    ///
    /// No-op while already connecting or connected; repeated calls never
    /// open a second transport. Requires a running tokio runtime (the
    /// channel is read by a spawned background task).
    pub fn connect(&self) {
        let (epoch, close_rx) = {
            let mut conn = self.inner.conn.lock().expect("connection state poisoned");
            match conn.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    log::debug!("[STREAM] connect() ignored: already {}", conn.state);
                    return;
                }
                ConnectionState::Disconnected | ConnectionState::Error => {}
            }
            conn.epoch += 1;
            conn.state = ConnectionState::Connecting;
            self.inner.registries.set_active_epoch(conn.epoch);
            let (close_tx, close_rx) = oneshot::channel();
            conn.close_tx = Some(close_tx);
            (conn.epoch, close_rx)
        };

        log::info!("[STREAM] Connecting to {}/events", self.inner.base_url);
        if let Some(recipient) = &self.inner.recipient_id {
            log::info!("[STREAM] Listening for named events: {}", recipient);
        }
        self.inner.registries.emit_status(ConnectionState::Connecting);

        let handle = tokio::spawn(reader::sse_reader_loop(
            Arc::clone(&self.inner),
            epoch,
            close_rx,
        ));

        let mut conn = self.inner.conn.lock().expect("connection state poisoned");
        if conn.epoch == epoch {
            conn.reader = Some(handle);
        }
    }

    /// Close the push channel.
    ///
    /// Safe to call when already disconnected (no-op, no duplicate status
    /// event). Once this returns, no message or error callback sourced from
    /// the closed channel will fire, even for frames that were in flight.
    pub fn disconnect(&self) {
        {
            let mut conn = self.inner.conn.lock().expect("connection state poisoned");
            if conn.state == ConnectionState::Disconnected {
                return;
            }
            conn.state = ConnectionState::Disconnected;
            conn.epoch += 1;
            self.inner.registries.set_active_epoch(conn.epoch);
            if let Some(close_tx) = conn.close_tx.take() {
                let _ = close_tx.send(());
            }
            conn.reader.take();
        }

        // Wait out any dispatch batch already in flight, so nothing sourced
        // from the closed channel runs after this call returns.
        self.inner.registries.quiesce();

        log::info!("[STREAM] Connection closed");
        self.inner.registries.emit_status(ConnectionState::Disconnected);
    }

    /// Subscribe to classified messages. Returns an unregister handle.
    pub fn subscribe_message(
        &self,
        callback: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registries.subscribe_message(callback)
    }

    /// Subscribe to connection status transitions.
    pub fn subscribe_status(
        &self,
        callback: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registries.subscribe_status(callback)
    }

    /// Subscribe to channel error events.
    pub fn subscribe_error(
        &self,
        callback: impl Fn(&StreamError) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registries.subscribe_error(callback)
    }

    /// Subscribe to broadcast messages only.
    pub fn subscribe_broadcast(
        &self,
        callback: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_message(move |msg| {
            if msg.is_broadcast() {
                callback(msg);
            }
        })
    }

    /// Subscribe to personal (addressed) messages only.
    pub fn subscribe_personal(
        &self,
        callback: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_message(move |msg| {
            if msg.is_personal() {
                callback(msg);
            }
        })
    }

    /// Submit a message through the request/response path (not the push
    /// channel). On failure an error event of kind `send_error` is emitted
    /// and the failure is returned to the caller.
    pub async fn send_message(&self, text: &str, category: &str) -> Result<SendAck> {
        let url = format!("{}/send-message", self.inner.base_url);
        let request = SendMessageRequest {
            message: text.to_string(),
            category: category.to_string(),
        };
        log::debug!("[SEND] POST {} (category={})", url, category);

        let response = match self.inner.http.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                self.inner
                    .registries
                    .emit_error(&StreamError::send(e.to_string()));
                return Err(PlannerLinkError::Http(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body)
            };
            log::warn!("[SEND] Server rejected message: {}", detail);
            self.inner.registries.emit_error(&StreamError::send(detail.clone()));
            return Err(PlannerLinkError::Send(detail));
        }

        match response.json::<SendAck>().await {
            Ok(ack) => {
                log::debug!("[SEND] Acknowledged: {:?}", ack.status);
                Ok(ack)
            }
            Err(e) => {
                let detail = format!("invalid acknowledgement: {}", e);
                self.inner
                    .registries
                    .emit_error(&StreamError::send(detail.clone()));
                Err(PlannerLinkError::Decode(detail))
            }
        }
    }

    /// Fetch the server status document. This is a direct query: failures
    /// propagate to the caller and no error event is emitted.
    pub async fn get_status(&self) -> Result<serde_json::Value> {
        let url = format!("{}/status", self.inner.base_url);
        log::debug!("[STREAM] GET {}", url);
        let response = self.inner.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlannerLinkError::Connection(format!(
                "status query returned HTTP {}",
                status
            )));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PlannerLinkError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for EventStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamClient")
            .field("base_url", &self.inner.base_url)
            .field("recipient_id", &self.inner.recipient_id)
            .field("state", &self.state().as_str())
            .finish()
    }
}

/// Builder for configuring [`EventStreamClient`] instances.
pub struct EventStreamClientBuilder {
    base_url: Option<String>,
    recipient_id: Option<String>,
    timeouts: PlannerLinkTimeouts,
    rewrites: Vec<HostRewrite>,
}

impl EventStreamClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            recipient_id: None,
            timeouts: PlannerLinkTimeouts::default(),
            rewrites: Vec::new(),
        }
    }

    /// Set the base URL of the planner notification service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Scope the channel to a recipient identifier. Frames on the named
    /// channel carrying this identifier classify as personal messages.
    pub fn recipient_id(mut self, id: impl Into<String>) -> Self {
        self.recipient_id = Some(id.into());
        self
    }

    /// Set timeout configuration for connection and request/response calls.
    pub fn timeouts(mut self, timeouts: PlannerLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Add an explicit host substitution applied when resolving the
    /// endpoint. Intended for deployments that publish a container-internal
    /// hostname; a matching rule is applied with a loud warning.
    pub fn rewrite_host(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rewrites.push(HostRewrite::new(from, to));
        self
    }

    /// Build the client, resolving and validating the endpoint.
    pub fn build(self) -> Result<EventStreamClient> {
        let raw = self
            .base_url
            .ok_or_else(|| PlannerLinkError::Configuration("base_url is required".into()))?;
        let base_url = resolve_endpoint(&raw, &self.rewrites)?;

        let http = reqwest::Client::builder()
            .connect_timeout(self.timeouts.connection_timeout)
            .timeout(self.timeouts.request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| PlannerLinkError::Configuration(e.to_string()))?;

        let stream_http = reqwest::Client::builder()
            .connect_timeout(self.timeouts.connection_timeout)
            .build()
            .map_err(|e| PlannerLinkError::Configuration(e.to_string()))?;

        Ok(EventStreamClient {
            inner: Arc::new(ClientInner {
                base_url,
                recipient_id: self.recipient_id,
                http,
                stream_http,
                registries: EventRegistries::new(),
                conn: Mutex::new(ConnState {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    close_tx: None,
                    reader: None,
                }),
            }),
        })
    }
}

/// Resolve and validate the configured endpoint.
///
/// Applies explicit [`HostRewrite`] rules (first match wins), strips any
/// trailing slash, and rejects URLs the HTTP client could not use.
fn resolve_endpoint(raw: &str, rewrites: &[HostRewrite]) -> Result<String> {
    let mut resolved = raw.trim().trim_end_matches('/').to_string();

    for rule in rewrites {
        if resolved.contains(&rule.from) {
            let rewritten = resolved.replacen(&rule.from, &rule.to, 1);
            log::warn!(
                "[STREAM] Endpoint host rewrite applied: '{}' -> '{}' (rule {} -> {})",
                resolved,
                rewritten,
                rule.from,
                rule.to
            );
            resolved = rewritten;
            break;
        }
    }

    let parsed = reqwest::Url::parse(&resolved)
        .map_err(|e| PlannerLinkError::Configuration(format!("invalid base_url '{}': {}", resolved, e)))?;
    if !parsed.has_host() {
        return Err(PlannerLinkError::Configuration(format!(
            "base_url '{}' has no host",
            resolved
        )));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = EventStreamClient::builder().build();
        assert!(matches!(result, Err(PlannerLinkError::Configuration(_))));
    }

    #[test]
    fn test_builder_minimal() {
        let client = EventStreamClient::builder()
            .base_url("http://localhost:8002")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8002");
        assert_eq!(client.recipient_id(), None);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let client = EventStreamClient::builder()
            .base_url("http://localhost:8002/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8002");
    }

    #[test]
    fn test_no_rewrite_without_a_rule() {
        let resolved = resolve_endpoint("http://planner-agent:8002", &[]).unwrap();
        assert_eq!(resolved, "http://planner-agent:8002");
    }

    #[test]
    fn test_explicit_rewrite_applies() {
        let rules = vec![HostRewrite::new("planner-agent", "localhost")];
        let resolved = resolve_endpoint("http://planner-agent:8002", &rules).unwrap();
        assert_eq!(resolved, "http://localhost:8002");
    }

    #[test]
    fn test_non_matching_rewrite_is_ignored() {
        let rules = vec![HostRewrite::new("planner-agent", "localhost")];
        let resolved = resolve_endpoint("http://example.com:8002", &rules).unwrap();
        assert_eq!(resolved, "http://example.com:8002");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = resolve_endpoint("not a url", &[]);
        assert!(matches!(result, Err(PlannerLinkError::Configuration(_))));
    }

    #[test]
    fn test_recipient_id_accessor() {
        let client = EventStreamClient::builder()
            .base_url("http://localhost:8002")
            .recipient_id("U1")
            .build()
            .unwrap();
        assert_eq!(client.recipient_id(), Some("U1"));
    }
}
