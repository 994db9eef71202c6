//! Normalized events, independent of the wire shape.

use chrono::{DateTime, Utc};

/// Something the user asked for, not yet serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundIntent {
    UserCommand {
        text: String,
        issued_at: DateTime<Utc>,
    },
}

impl OutboundIntent {
    pub fn user_command(text: impl Into<String>) -> Self {
        Self::UserCommand {
            text: text.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Everything the session channel reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Greeting sent by the backend when a session starts.
    Welcome(String),
    AssistantReply(String),
    ChannelError(String),
    /// The transport opened. Never produced by a codec.
    ConnectAck,
    /// The transport dropped without being asked to. Never produced by a codec.
    DisconnectNotice,
}
