//! Background SSE reader task.
//!
//! Owns the push-channel response stream and forwards classified messages
//! to the subscriber registries. All dispatch goes through the epoch gate,
//! so a task superseded by `disconnect()`/reconnect can never deliver.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::oneshot;

use crate::models::{ConnectionState, StreamError, WireMessage};
use crate::sse::{SseFrame, SseFrameParser};

use super::ClientInner;

/// Background task that opens `<base>/events` and pumps frames until the
/// close signal fires, the stream ends, or the transport fails.
///
/// Responsibilities:
/// - Open the channel and report `Connecting -> Connected` / `-> Error`
/// - Parse SSE frames, demultiplex default vs. named channel
/// - Decode bodies into messages; report undecodable bodies as
///   `parse_error` events without dropping the channel
/// - Report transport failures as one status event plus one
///   `connection_error` event, then exit (no automatic retry)
pub(crate) async fn sse_reader_loop(
    inner: Arc<ClientInner>,
    epoch: u64,
    mut close_rx: oneshot::Receiver<()>,
) {
    let url = format!("{}/events", inner.base_url);
    let request = inner
        .stream_http
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream");

    let response = tokio::select! {
        biased;
        _ = &mut close_rx => return,
        response = request.send() => response,
    };

    let response = match response {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            fail(&inner, epoch, format!("server returned HTTP {}", response.status()));
            return;
        }
        Err(e) => {
            fail(&inner, epoch, format!("failed to open event stream: {}", e));
            return;
        }
    };

    if !inner.transition_if_current(epoch, ConnectionState::Connected) {
        return;
    }
    log::info!("[STREAM] Event stream opened");
    if !inner.registries.emit_status_gated(epoch, ConnectionState::Connected) {
        return;
    }

    let stream = response.bytes_stream();
    tokio::pin!(stream);
    let mut parser = SseFrameParser::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = &mut close_rx => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in parser.push(&bytes) {
                    if !handle_frame(&inner, epoch, frame) {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                fail(&inner, epoch, format!("event stream read failed: {}", e));
                return;
            }
            None => {
                if let Some(frame) = parser.finish() {
                    if !handle_frame(&inner, epoch, frame) {
                        return;
                    }
                }
                fail(&inner, epoch, "server closed the event stream".to_string());
                return;
            }
        }
    }
}

/// Transport-level failure: state -> `Error`, one status event, one
/// `connection_error` event. Retry is the caller's responsibility.
fn fail(inner: &Arc<ClientInner>, epoch: u64, detail: String) {
    if !inner.transition_if_current(epoch, ConnectionState::Error) {
        return;
    }
    log::warn!("[STREAM] {}", detail);
    if inner.registries.emit_status_gated(epoch, ConnectionState::Error) {
        inner
            .registries
            .emit_error_gated(epoch, &StreamError::connection(detail));
    }
}

/// Classify and dispatch one frame. Returns false when the epoch went
/// stale and the reader should exit.
fn handle_frame(inner: &Arc<ClientInner>, epoch: u64, frame: SseFrame) -> bool {
    // A body that carries the wire protocol's own field markers means a
    // misformatted frame was delivered as a message body; drop it.
    if frame.data.contains("event:") || frame.data.contains("data:") {
        log::warn!(
            "[STREAM] Dropping frame whose body contains raw SSE markers: {}",
            frame.data
        );
        return true;
    }

    let recipient = match &frame.event {
        None => None,
        Some(name) => match inner.recipient_id.as_deref() {
            Some(recipient) if recipient == name => Some(recipient.to_string()),
            _ => {
                // Named frame for some other recipient; not ours to deliver.
                log::debug!("[STREAM] Ignoring frame on foreign channel '{}'", name);
                return true;
            }
        },
    };

    match serde_json::from_str::<WireMessage>(&frame.data) {
        Ok(wire) => {
            let message = match recipient {
                Some(recipient) => wire.into_personal(recipient),
                None => wire.into_broadcast(),
            };
            log::debug!(
                "[STREAM] Message received ({}): {}",
                if message.is_broadcast() { "broadcast" } else { "personal" },
                message.text
            );
            inner.registries.emit_message_gated(epoch, &message)
        }
        Err(e) => {
            log::warn!("[STREAM] Failed to decode frame body: {} (raw: {})", e, frame.data);
            inner.registries.emit_error_gated(
                epoch,
                &StreamError::parse(e.to_string(), frame.data),
            )
        }
    }
}
