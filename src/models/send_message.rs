use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Request body for the message-submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Message text.
    pub message: String,

    /// Message category.
    #[serde(rename = "type")]
    pub category: String,
}

/// Acknowledgement returned by the message-submission endpoint.
///
/// Only `status` is interpreted; the rest of the document is kept verbatim
/// for callers that want it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAck {
    /// Server-reported outcome, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Remainder of the acknowledgement document.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}
