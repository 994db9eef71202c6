//! Envelope codecs.
//!
//! A codec is chosen once, from [`WireFormat`], when a session is built.
//! Decoding never panics: anything that is not a known inbound envelope
//! comes back as a [`DecodeFailure`].

use crate::envelope::{NamedEvent, TypedFrame};
use crate::event::{InboundEvent, OutboundIntent};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Translate between intents/events and text frames.
pub trait EnvelopeCodec: Send + Sync + 'static {
    fn encode(&self, intent: &OutboundIntent) -> String;
    fn decode(&self, frame: &str) -> Result<InboundEvent, DecodeFailure>;
}

/// Why an inbound frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("frame has no discriminator")]
    MissingDiscriminator,
    #[error("unknown envelope kind: {0}")]
    UnknownKind(String),
    #[error("envelope kind {0} is client-to-server only")]
    OutboundOnly(String),
}

/// Which envelope shape the backend speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// JSON frames tagged with `type` over one socket.
    #[default]
    TypedFrame,
    /// `["event", data]` frames over a multiplexed event transport.
    EventChannel,
}

impl WireFormat {
    pub fn codec(self) -> Box<dyn EnvelopeCodec> {
        match self {
            WireFormat::TypedFrame => Box::new(TypedFrameCodec),
            WireFormat::EventChannel => Box::new(EventChannelCodec),
        }
    }
}

/// Codec for `{"type": ..., "text"|"message": ...}` frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedFrameCodec;

const KNOWN_FRAME_KINDS: &[&str] = &["command", "welcome", "response", "error"];

/// Shown when the backend reports an error without saying what went wrong.
const UNSPECIFIED_ERROR: &str = "The assistant reported an error.";

fn error_text(text: Option<String>) -> String {
    text.filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNSPECIFIED_ERROR.to_string())
}

impl EnvelopeCodec for TypedFrameCodec {
    fn encode(&self, intent: &OutboundIntent) -> String {
        let OutboundIntent::UserCommand { text, .. } = intent;
        json!({ "type": "command", "text": text }).to_string()
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent, DecodeFailure> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| DecodeFailure::Malformed(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeFailure::MissingDiscriminator)?;
        if !KNOWN_FRAME_KINDS.contains(&kind) {
            return Err(DecodeFailure::UnknownKind(kind.to_string()));
        }

        let kind = kind.to_string();
        let frame: TypedFrame =
            serde_json::from_value(value).map_err(|e| DecodeFailure::Malformed(e.to_string()))?;
        match frame {
            TypedFrame::Welcome(payload) => Ok(InboundEvent::Welcome(payload.into_content())),
            TypedFrame::Response(payload) => {
                Ok(InboundEvent::AssistantReply(payload.into_content()))
            }
            TypedFrame::Error(payload) => Ok(InboundEvent::ChannelError(error_text(
                payload.message.or(payload.text),
            ))),
            TypedFrame::Command { .. } => Err(DecodeFailure::OutboundOnly(kind)),
        }
    }
}

/// Codec for named events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventChannelCodec;

impl EnvelopeCodec for EventChannelCodec {
    fn encode(&self, intent: &OutboundIntent) -> String {
        let OutboundIntent::UserCommand { text, issued_at } = intent;
        NamedEvent::new(
            "message",
            json!({
                "content": text,
                "timestamp": issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        )
        .to_frame()
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent, DecodeFailure> {
        let event =
            NamedEvent::from_frame(frame).map_err(|e| DecodeFailure::Malformed(e.to_string()))?;
        match event.event.as_str() {
            "response" => event
                .text()
                .map(InboundEvent::AssistantReply)
                .ok_or_else(|| DecodeFailure::Malformed("response event without text".into())),
            "error" => Ok(InboundEvent::ChannelError(error_text(event.text()))),
            "message" => Err(DecodeFailure::OutboundOnly(event.event)),
            "" => Err(DecodeFailure::MissingDiscriminator),
            _ => Err(DecodeFailure::UnknownKind(event.event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn command(text: &str) -> OutboundIntent {
        OutboundIntent::UserCommand {
            text: text.into(),
            issued_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn typed_encode() {
        let frame = TypedFrameCodec.encode(&command("hello"));
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"type": "command", "text": "hello"}));
    }

    #[test]
    fn typed_decode_replies() {
        let codec = TypedFrameCodec;
        assert_eq!(
            codec.decode(r#"{"type":"response","message":"hi"}"#),
            Ok(InboundEvent::AssistantReply("hi".into()))
        );
        assert_eq!(
            codec.decode(r#"{"type":"response","text":"from text"}"#),
            Ok(InboundEvent::AssistantReply("from text".into()))
        );
        assert_eq!(
            codec.decode(r#"{"type":"welcome","message":"Hello!"}"#),
            Ok(InboundEvent::Welcome("Hello!".into()))
        );
        assert_eq!(
            codec.decode(r#"{"type":"welcome"}"#),
            Ok(InboundEvent::Welcome(String::new()))
        );
    }

    #[test]
    fn typed_decode_error() {
        assert_eq!(
            TypedFrameCodec.decode(r#"{"type":"error","message":"backend down"}"#),
            Ok(InboundEvent::ChannelError("backend down".into()))
        );
    }

    #[test]
    fn error_without_text_uses_fallback_in_both_formats() {
        let expected = Ok(InboundEvent::ChannelError(UNSPECIFIED_ERROR.into()));
        assert_eq!(TypedFrameCodec.decode(r#"{"type":"error"}"#), expected);
        assert_eq!(TypedFrameCodec.decode(r#"{"type":"error","text":"  "}"#), expected);
        assert_eq!(EventChannelCodec.decode(r#"["error"]"#), expected);
        assert_eq!(EventChannelCodec.decode(r#"["error",{}]"#), expected);
    }

    #[test]
    fn typed_decode_failures() {
        let codec = TypedFrameCodec;
        assert!(matches!(codec.decode("not json"), Err(DecodeFailure::Malformed(_))));
        assert_eq!(
            codec.decode(r#"{"text":"no type"}"#),
            Err(DecodeFailure::MissingDiscriminator)
        );
        assert_eq!(
            codec.decode(r#"{"type":"snapshot","data":{}}"#),
            Err(DecodeFailure::UnknownKind("snapshot".into()))
        );
        assert_eq!(
            codec.decode(r#"{"type":"command","text":"echo"}"#),
            Err(DecodeFailure::OutboundOnly("command".into()))
        );
        assert!(matches!(
            codec.decode(r#"{"type":"response","message":42}"#),
            Err(DecodeFailure::Malformed(_))
        ));
        assert_eq!(codec.decode("[]"), Err(DecodeFailure::MissingDiscriminator));
    }

    #[test]
    fn event_encode() {
        let frame = EventChannelCodec.encode(&command("hello"));
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!(["message", {"content": "hello", "timestamp": "2024-03-01T12:30:00.000Z"}])
        );
    }

    #[test]
    fn event_decode() {
        let codec = EventChannelCodec;
        assert_eq!(
            codec.decode(r#"["response",{"content":"hi"}]"#),
            Ok(InboundEvent::AssistantReply("hi".into()))
        );
        assert_eq!(
            codec.decode(r#"["error",{"message":"rate limited"}]"#),
            Ok(InboundEvent::ChannelError("rate limited".into()))
        );
        assert_eq!(
            codec.decode(r#"["error"]"#),
            Ok(InboundEvent::ChannelError("The assistant reported an error.".into()))
        );
    }

    #[test]
    fn event_decode_failures() {
        let codec = EventChannelCodec;
        assert!(matches!(codec.decode(r#"{"type":"response"}"#), Err(DecodeFailure::Malformed(_))));
        assert!(matches!(codec.decode(r#"["response",{}]"#), Err(DecodeFailure::Malformed(_))));
        assert_eq!(
            codec.decode(r#"["typing",{}]"#),
            Err(DecodeFailure::UnknownKind("typing".into()))
        );
        assert_eq!(
            codec.decode(r#"["message",{"content":"x"}]"#),
            Err(DecodeFailure::OutboundOnly("message".into()))
        );
    }

    #[test]
    fn wire_format_selects_codec() {
        let intent = command("ping");
        assert!(WireFormat::TypedFrame.codec().encode(&intent).contains("\"command\""));
        assert!(WireFormat::EventChannel.codec().encode(&intent).starts_with("[\"message\""));
    }
}
