//! Core types for the relaydesk session channel.
//!
//! This crate holds everything that does not touch IO: the two wire envelope
//! shapes, the codecs that normalize them into typed events, and the
//! append-only message log. The client crate drives these from a live
//! connection.

mod codec;
mod envelope;
mod event;
mod log;

pub use codec::{DecodeFailure, EnvelopeCodec, EventChannelCodec, TypedFrameCodec, WireFormat};
pub use envelope::{FramePayload, NamedEvent, TypedFrame};
pub use event::{InboundEvent, OutboundIntent};
pub use log::{Message, MessageId, MessageLog, Role};

use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The transport is open and frames flow both ways.
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// What a UI needs to render the session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// True only while the transport is open.
    pub connected: bool,
    /// True between an accepted send and the next reply or error.
    pub loading: bool,
}
