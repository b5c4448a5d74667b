use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

fn default_category() -> String {
    "info".to_string()
}

/// Wire-level message body carried by a push frame.
///
/// The server sends `{"message": "...", "type": "...", ...}`; any field
/// beyond the core schema lands in `extra` so forward-compatible payloads
/// survive the round trip without loosening the core types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Human-readable message text.
    pub message: String,

    /// Message category (`success`, `error`, `warning`, `info`, ...).
    #[serde(rename = "type", default = "default_category")]
    pub category: String,

    /// Server-side timestamp, if the sender attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Open map of additional wire fields.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl WireMessage {
    /// Classify this body as a broadcast message (default channel).
    pub fn into_broadcast(self) -> PushMessage {
        PushMessage {
            text: self.message,
            category: self.category,
            timestamp: self.timestamp,
            extra: self.extra,
            delivery: Delivery::Broadcast,
        }
    }

    /// Classify this body as a personal message addressed to `recipient_id`
    /// (it arrived on the named channel carrying that identifier).
    pub fn into_personal(self, recipient_id: impl Into<String>) -> PushMessage {
        PushMessage {
            text: self.message,
            category: self.category,
            timestamp: self.timestamp,
            extra: self.extra,
            delivery: Delivery::Personal {
                recipient_id: recipient_id.into(),
            },
        }
    }
}

/// How a message was addressed.
///
/// Exactly one variant applies to every classified message; the enum makes
/// the "never both, never neither" invariant structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Delivery {
    /// Delivered via the default channel to every connected listener.
    Broadcast,
    /// Delivered via the named channel for one recipient.
    Personal { recipient_id: String },
}

/// A push message after channel classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Human-readable message text.
    pub text: String,
    /// Message category (`success`, `error`, `warning`, `info`, ...).
    pub category: String,
    /// Server-side timestamp, if the sender attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Open map of additional wire fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
    /// How the message was addressed.
    pub delivery: Delivery,
}

impl PushMessage {
    /// Returns true if this message arrived on the default channel.
    pub fn is_broadcast(&self) -> bool {
        matches!(self.delivery, Delivery::Broadcast)
    }

    /// Returns true if this message was addressed to a single recipient.
    pub fn is_personal(&self) -> bool {
        matches!(self.delivery, Delivery::Personal { .. })
    }

    /// The recipient identifier for personal messages, `None` for broadcasts.
    pub fn recipient_id(&self) -> Option<&str> {
        match &self.delivery {
            Delivery::Broadcast => None,
            Delivery::Personal { recipient_id } => Some(recipient_id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_parse_with_extras() {
        let wire: WireMessage = serde_json::from_str(
            r#"{"message":"Hello","type":"info","task_id":"t-1","priority":3}"#,
        )
        .unwrap();
        assert_eq!(wire.message, "Hello");
        assert_eq!(wire.category, "info");
        assert_eq!(wire.extra.get("task_id").unwrap(), "t-1");
        assert_eq!(wire.extra.get("priority").unwrap(), 3);
    }

    #[test]
    fn test_missing_category_defaults_to_info() {
        let wire: WireMessage = serde_json::from_str(r#"{"message":"Hello"}"#).unwrap();
        assert_eq!(wire.category, "info");
    }

    #[test]
    fn test_missing_message_is_rejected() {
        let result = serde_json::from_str::<WireMessage>(r#"{"type":"info"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_classification_is_exclusive() {
        let wire: WireMessage =
            serde_json::from_str(r#"{"message":"Hi","type":"success"}"#).unwrap();

        let broadcast = wire.clone().into_broadcast();
        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_personal());
        assert_eq!(broadcast.recipient_id(), None);

        let personal = wire.into_personal("U1");
        assert!(personal.is_personal());
        assert!(!personal.is_broadcast());
        assert_eq!(personal.recipient_id(), Some("U1"));
    }

    #[test]
    fn test_delivery_serde_round_trip() {
        let personal = Delivery::Personal {
            recipient_id: "U1".to_string(),
        };
        let json = serde_json::to_string(&personal).unwrap();
        assert!(json.contains("\"scope\":\"personal\""));
        assert_eq!(serde_json::from_str::<Delivery>(&json).unwrap(), personal);

        let json = serde_json::to_string(&Delivery::Broadcast).unwrap();
        assert!(json.contains("\"scope\":\"broadcast\""));
    }
}
