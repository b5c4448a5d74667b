//! Incremental SSE frame parser.
//!
//! The planner push channel is standard Server-Sent Events over HTTP:
//! - `event: <name>` - optional event name line
//! - `data: <payload>` - data payload line (may repeat; joined with `\n`)
//! - Empty line - terminates the frame
//! - Lines starting with `:` - comments (ignored)
//!
//! Chunk boundaries from the HTTP transport are arbitrary, so the parser
//! buffers raw bytes and only consumes complete lines. `id:` and `retry:`
//! fields are accepted and ignored; this client never resumes by event id.

use bytes::BytesMut;

/// One complete frame read off the push channel.
///
/// `event` is `None` for default (unnamed) frames; an explicit
/// `event: message` line is normalized to the default channel as well,
/// matching EventSource semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name, if the frame carried a non-default `event:` line.
    pub event: Option<String>,
    /// Data payload (multi-line `data:` fields joined with `\n`).
    pub data: String,
}

impl SseFrame {
    /// Returns true if this frame arrived on the default/unmarked channel.
    pub fn is_default_channel(&self) -> bool {
        self.event.is_none()
    }
}

/// Buffering SSE parser fed with raw transport chunks.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: BytesMut,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }

            let line = match std::str::from_utf8(&line_bytes) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    log::warn!("[SSE] Skipping non-UTF-8 line ({} bytes)", line_bytes.len());
                    continue;
                }
            };

            if let Some(frame) = self.handle_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush a trailing frame after the stream ends without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let trailing = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
            self.buffer.clear();
            if let Some(frame) = self.handle_line(&trailing) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn handle_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None; // comment / keepalive
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // A line with no colon is a field with an empty value.
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            "id" | "retry" => {}
            other => {
                log::debug!("[SSE] Ignoring unknown field '{}'", other);
            }
        }
        None
    }

    /// Complete the pending frame, if it accumulated any data.
    fn take_frame(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            // A data-less frame dispatches nothing, but any pending event
            // name is still discarded.
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");

        // `event: message` is the default channel spelled out explicitly.
        let event = event.filter(|name| name != "message");
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Vec<SseFrame> {
        let mut parser = SseFrameParser::new();
        let mut frames = parser.push(input.as_bytes());
        if let Some(trailing) = parser.finish() {
            frames.push(trailing);
        }
        frames
    }

    #[test]
    fn parses_default_frame() {
        let frames = parse_all("data: {\"message\":\"hi\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "{\"message\":\"hi\"}");
        assert!(frames[0].is_default_channel());
    }

    #[test]
    fn parses_named_frame() {
        let frames = parse_all("event: user123\ndata: {\"message\":\"hi\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("user123"));
    }

    #[test]
    fn explicit_message_event_is_default_channel() {
        let frames = parse_all("event: message\ndata: {\"v\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_default_channel());
    }

    #[test]
    fn joins_multi_line_data() {
        let frames = parse_all("data: line one\ndata: line two\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn handles_chunk_split_mid_line() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"data: {\"par").is_empty());
        let frames = parser.push(b"tial\":true}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"partial\":true}");
    }

    #[test]
    fn handles_multiple_frames_in_one_chunk() {
        let frames = parse_all("data: {\"a\":1}\n\nevent: u1\ndata: {\"b\":2}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[1].event.as_deref(), Some("u1"));
    }

    #[test]
    fn handles_carriage_returns() {
        let frames = parse_all("event: u1\r\ndata: {\"cr\":true}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("u1"));
        assert_eq!(frames[0].data, "{\"cr\":true}");
    }

    #[test]
    fn skips_comments() {
        let frames = parse_all(": keepalive\n\ndata: {\"v\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"v\":1}");
    }

    #[test]
    fn ignores_id_and_retry_fields() {
        let frames = parse_all("id: 7\nretry: 1000\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn frame_without_data_dispatches_nothing() {
        assert!(parse_all("event: u1\n\n").is_empty());
    }

    #[test]
    fn event_name_does_not_leak_into_next_frame() {
        let frames = parse_all("event: u1\n\ndata: {\"v\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn data_with_no_space_after_colon() {
        let frames = parse_all("data:{\"v\":1}\n\n");
        assert_eq!(frames[0].data, "{\"v\":1}");
    }

    #[test]
    fn finish_flushes_trailing_frame() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"data: {\"trailing\":true}").is_empty());
        let frame = parser.finish().expect("trailing frame");
        assert_eq!(frame.data, "{\"trailing\":true}");
    }

    #[test]
    fn finish_on_empty_parser_is_none() {
        let mut parser = SseFrameParser::new();
        assert!(parser.finish().is_none());
    }
}
