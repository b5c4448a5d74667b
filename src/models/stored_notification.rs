use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::push_message::{Delivery, PushMessage};

/// One persisted entry in the notification store.
///
/// Carries the message fields flattened alongside store-owned metadata.
/// Lifecycle is independent of the push channel: entries survive
/// disconnects, reconnects, and process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNotification {
    /// Unique, generation-ordered identifier assigned by the store.
    pub id: String,
    /// Message text.
    pub text: String,
    /// Message category.
    pub category: String,
    /// Server-side timestamp, if the sender attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// How the message was addressed.
    pub delivery: Delivery,
    /// Additional wire fields carried by the message.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
    /// Millis since Unix epoch when the store received the message.
    pub received_at_ms: u64,
    /// Read-state flag, `false` on receipt.
    pub read: bool,
}

impl StoredNotification {
    /// Build a fresh unread entry from a classified message.
    pub(crate) fn from_message(id: String, message: PushMessage, received_at_ms: u64) -> Self {
        Self {
            id,
            text: message.text,
            category: message.category,
            timestamp: message.timestamp,
            delivery: message.delivery,
            extra: message.extra,
            received_at_ms,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let entry = StoredNotification {
            id: "ntf_1_0001".to_string(),
            text: "Hello".to_string(),
            category: "info".to_string(),
            timestamp: None,
            delivery: Delivery::Personal {
                recipient_id: "U1".to_string(),
            },
            extra: Map::new(),
            received_at_ms: 1_700_000_000_000,
            read: false,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: StoredNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
