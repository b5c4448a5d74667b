use std::fmt;

/// Classification of a channel-side fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreamErrorKind {
    /// A frame body could not be decoded; non-fatal, the channel stays open.
    Parse,
    /// The transport failed or was refused; fatal to the current attempt.
    Connection,
    /// A message-submission call failed.
    Send,
}

impl StreamErrorKind {
    /// Stable wire-facing name for the error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse_error",
            Self::Connection => "connection_error",
            Self::Send => "send_error",
        }
    }
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error event delivered to error subscribers.
///
/// These never propagate as failures out of the dispatch path; they are
/// reported, and each subscriber decides what to do with them.
#[derive(Debug, Clone)]
pub struct StreamError {
    /// What failed.
    pub kind: StreamErrorKind,
    /// Human-readable detail.
    pub detail: String,
    /// The raw payload that triggered the error, when one exists
    /// (always set for `Parse`).
    pub raw: Option<String>,
}

impl StreamError {
    pub fn parse(detail: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: StreamErrorKind::Parse,
            detail: detail.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self {
            kind: StreamErrorKind::Connection,
            detail: detail.into(),
            raw: None,
        }
    }

    pub fn send(detail: impl Into<String>) -> Self {
        Self {
            kind: StreamErrorKind::Send,
            detail: detail.into(),
            raw: None,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(StreamErrorKind::Parse.as_str(), "parse_error");
        assert_eq!(StreamErrorKind::Connection.as_str(), "connection_error");
        assert_eq!(StreamErrorKind::Send.as_str(), "send_error");
    }

    #[test]
    fn test_parse_error_carries_raw_payload() {
        let err = StreamError::parse("bad json", "{not json");
        assert_eq!(err.kind, StreamErrorKind::Parse);
        assert_eq!(err.raw.as_deref(), Some("{not json"));
    }

    #[test]
    fn test_display() {
        let err = StreamError::connection("refused");
        assert_eq!(err.to_string(), "connection_error: refused");
    }
}
