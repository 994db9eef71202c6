//! Server side of both wire shapes.

use relaydesk_core::{FramePayload, NamedEvent, TypedFrame, WireFormat};
use serde_json::json;

pub const WELCOME: &str = "Hello! I'm YAAN, your AI assistant. How can I help you today?";

/// Encodes server frames and pulls command text out of client frames.
#[derive(Debug, Clone, Copy)]
pub struct ServerCodec {
    format: WireFormat,
}

impl ServerCodec {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn welcome(&self, text: &str) -> String {
        match self.format {
            WireFormat::TypedFrame => typed(TypedFrame::Welcome(FramePayload::message(text))),
            WireFormat::EventChannel => NamedEvent::new("response", json!({ "content": text })).to_frame(),
        }
    }

    pub fn reply(&self, text: &str) -> String {
        match self.format {
            WireFormat::TypedFrame => typed(TypedFrame::Response(FramePayload::text(text))),
            WireFormat::EventChannel => NamedEvent::new("response", json!({ "content": text })).to_frame(),
        }
    }

    pub fn error(&self, text: &str) -> String {
        match self.format {
            WireFormat::TypedFrame => typed(TypedFrame::Error(FramePayload::message(text))),
            WireFormat::EventChannel => NamedEvent::new("error", json!({ "message": text })).to_frame(),
        }
    }

    /// Command text from a client frame, or `None` for anything else.
    pub fn command(&self, frame: &str) -> Option<String> {
        match self.format {
            WireFormat::TypedFrame => match serde_json::from_str::<TypedFrame>(frame).ok()? {
                TypedFrame::Command { text } => Some(text),
                _ => None,
            },
            WireFormat::EventChannel => {
                let event = NamedEvent::from_frame(frame).ok()?;
                if event.event != "message" {
                    return None;
                }
                event.text()
            }
        }
    }
}

fn typed(frame: TypedFrame) -> String {
    // TypedFrame only holds strings, serialization cannot fail.
    serde_json::to_string(&frame).unwrap_or_default()
}
