//! Reconnecting session channel to an assistant backend.
//!
//! ```no_run
//! use relaydesk_client::{ChannelConfig, ChannelEvent, SessionChannel};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = SessionChannel::new(ChannelConfig::default())?;
//! let mut events = channel.subscribe();
//! channel.open();
//!
//! while let Some(event) = events.recv().await {
//!     if let ChannelEvent::ConnectionChanged(state) = event {
//!         if state.is_connected() {
//!             channel.send("what time is it?").await?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod policy;
mod supervisor;
mod timer;
mod transport;

pub use channel::{CONNECTION_LOST_NOTICE, ChannelEvent, SendError, SessionChannel, Subscription};
pub use config::{ChannelConfig, ConfigError, DEFAULT_ENDPOINT, ReconnectConfig};
pub use policy::{ReconnectPolicy, ReconnectStrategy, RetryDecision};
pub use supervisor::{LinkEvent, NotConnected, Supervisor, SupervisorEvent, SupervisorInput};
pub use timer::{RetryTick, RetryTimer};
pub use transport::{Connector, FrameSink, FrameStream, Link, TransportError, WsConnector};

pub use relaydesk_core::{
    ChannelState, ConnectionState, InboundEvent, Message, MessageId, Role, WireFormat,
};
