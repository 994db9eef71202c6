//! Wire envelopes.
//!
//! Two shapes exist in the wild. Typed frames carry a `type` discriminator
//! next to the payload; named events are `["event", data]` arrays as emitted
//! by multiplexed event transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame on the single-socket transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedFrame {
    // Client -> Server
    Command { text: String },

    // Server -> Client
    Welcome(FramePayload),
    Response(FramePayload),
    Error(FramePayload),
}

/// Server payload. Backends disagree on the field name, so both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FramePayload {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: None,
            text: Some(text.into()),
        }
    }

    /// The carried text; `message` wins over `text`, absent means empty.
    pub fn into_content(self) -> String {
        self.message.or(self.text).unwrap_or_default()
    }
}

/// A named event on the multiplexed transport.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEvent {
    pub event: String,
    pub data: Value,
}

impl NamedEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize as the `["event", data]` frame body.
    pub fn to_frame(&self) -> String {
        Value::Array(vec![Value::String(self.event.clone()), self.data.clone()]).to_string()
    }

    /// Parse a `["event", data]` frame body. A missing data element is `null`.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        let (event, data): (String, Option<Value>) = match serde_json::from_str(frame) {
            Ok(pair) => pair,
            Err(_) => {
                let (event,): (String,) = serde_json::from_str(frame)?;
                (event, None)
            }
        };
        Ok(Self {
            event,
            data: data.unwrap_or(Value::Null),
        })
    }

    /// Text carried by an inbound event: a bare string, or the first of
    /// `content`, `message`, `text` present on an object.
    pub fn text(&self) -> Option<String> {
        match &self.data {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["content", "message", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }
}
