//! The session channel: the one object a UI talks to.
//!
//! A [`SessionChannel`] spawns a driver task that owns the supervisor, the
//! codec, the subscriber registry and write access to the message log.
//! Consumer calls are queued as commands; link and timer events arrive on the
//! supervisor's queue. The driver is the only consumer of both, so the log,
//! connection state and loading flag have a single writer.

use crate::config::{ChannelConfig, ConfigError};
use crate::supervisor::{Supervisor, SupervisorEvent, SupervisorInput};
use crate::transport::{Connector, WsConnector};
use relaydesk_core::{
    ChannelState, ConnectionState, EnvelopeCodec, InboundEvent, Message, MessageLog,
    OutboundIntent, Role,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc, oneshot};

/// Appended once each time an open connection drops.
pub const CONNECTION_LOST_NOTICE: &str = "Connection to server lost. Attempting to reconnect...";

fn retry_exhausted_notice(attempts: u32) -> String {
    format!(
        "Unable to reach the assistant after {attempts} attempts. Reopen the session to try again."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,
    #[error("not connected to the assistant")]
    NotConnected,
}

/// Delivered to subscribers, in the order things happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    MessageAppended(Message),
    ConnectionChanged(ConnectionState),
    LoadingChanged(bool),
}

enum Command {
    Open,
    Close(oneshot::Sender<()>),
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    Subscribe {
        id: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
    },
    Unsubscribe(u64),
}

#[derive(Debug, Default)]
struct SessionView {
    log: MessageLog,
    connection: ConnectionState,
    loading: bool,
}

/// Handle to a running session. Dropping it stops the driver and closes the
/// connection. Must be created inside a Tokio runtime.
pub struct SessionChannel {
    commands: mpsc::UnboundedSender<Command>,
    view: Arc<RwLock<SessionView>>,
    next_subscriber: AtomicU64,
}

impl SessionChannel {
    /// Channel over the WebSocket transport.
    pub fn new(config: ChannelConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (supervisor, inputs) = Supervisor::new(
            connector,
            config.endpoint.clone(),
            config.connect_timeout(),
            config.reconnect.strategy(),
        );
        let view = Arc::new(RwLock::new(SessionView::default()));
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            supervisor,
            codec: config.wire_format.codec(),
            view: view.clone(),
            listeners: Vec::new(),
        };
        tokio::spawn(driver.run(commands_rx, inputs));
        tracing::debug!(endpoint = %config.endpoint, wire_format = ?config.wire_format, "Session channel started");

        Ok(Self {
            commands,
            view,
            next_subscriber: AtomicU64::new(1),
        })
    }

    /// Start connecting. Returns immediately; progress arrives on
    /// subscriptions. No-op while connecting or connected.
    pub fn open(&self) {
        let _ = self.commands.send(Command::Open);
    }

    /// Stop the session. Once this returns, nothing changes until `open`.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Close(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send a user command. Rejected sends leave the log untouched.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), SendError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SendError::Empty);
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { text, reply })
            .map_err(|_| SendError::NotConnected)?;
        rx.await.unwrap_or(Err(SendError::NotConnected))
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (events, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::Subscribe { id, events });
        Subscription {
            id,
            events: rx,
            commands: self.commands.downgrade(),
        }
    }

    pub async fn current_state(&self) -> ChannelState {
        let view = self.view.read().await;
        ChannelState {
            connected: view.connection.is_connected(),
            loading: view.loading,
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.view.read().await.connection
    }

    /// Snapshot of the conversation so far, oldest first.
    pub async fn current_log(&self) -> Vec<Message> {
        self.view.read().await.log.snapshot()
    }
}

/// A registered listener. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe(self.id));
        }
    }
}

struct Driver {
    supervisor: Supervisor,
    codec: Box<dyn EnvelopeCodec>,
    view: Arc<RwLock<SessionView>>,
    listeners: Vec<(u64, mpsc::UnboundedSender<ChannelEvent>)>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inputs: mpsc::UnboundedReceiver<SupervisorInput>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(input) = inputs.recv() => {
                    for event in self.supervisor.handle(input) {
                        self.apply(event).await;
                    }
                }
            }
        }
        self.supervisor.close();
        tracing::debug!("Session channel stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open => {
                for event in self.supervisor.open() {
                    self.apply(event).await;
                }
            }
            Command::Close(done) => {
                for event in self.supervisor.close() {
                    self.apply(event).await;
                }
                let _ = done.send(());
            }
            Command::Send { text, reply } => {
                let result = self.send(text).await;
                let _ = reply.send(result);
            }
            Command::Subscribe { id, events } => self.listeners.push((id, events)),
            Command::Unsubscribe(id) => self.listeners.retain(|(other, _)| *other != id),
        }
    }

    async fn send(&mut self, text: String) -> Result<(), SendError> {
        if text.trim().is_empty() {
            return Err(SendError::Empty);
        }
        if !self.supervisor.can_transmit() {
            return Err(SendError::NotConnected);
        }

        let intent = OutboundIntent::user_command(text);
        let OutboundIntent::UserCommand { text, issued_at } = &intent;
        let message = self
            .view
            .write()
            .await
            .log
            .append_at(Role::User, text.clone(), *issued_at)
            .clone();
        self.notify(ChannelEvent::MessageAppended(message));
        self.set_loading(true).await;

        // The message is already logged; a drop from here on is reported by
        // the connection-lost notice.
        let frame = self.codec.encode(&intent);
        if self.supervisor.transmit(frame).is_err() {
            tracing::warn!("Link went away before the command could be sent");
        }
        Ok(())
    }

    async fn apply(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Connecting { attempt } => {
                tracing::debug!(attempt, "Connecting");
                self.set_connection(ConnectionState::Connecting).await;
            }
            SupervisorEvent::Connected => self.dispatch(InboundEvent::ConnectAck).await,
            SupervisorEvent::AttemptFailed { .. } => {
                self.set_connection(ConnectionState::Disconnected).await;
            }
            SupervisorEvent::Lost { .. } => self.dispatch(InboundEvent::DisconnectNotice).await,
            SupervisorEvent::Exhausted { attempts, .. } => {
                self.set_connection(ConnectionState::Disconnected).await;
                self.dispatch(InboundEvent::ChannelError(retry_exhausted_notice(attempts)))
                    .await;
            }
            SupervisorEvent::Frame(frame) => match self.codec.decode(&frame) {
                Ok(event) => self.dispatch(event).await,
                Err(failure) => {
                    tracing::warn!(%failure, frame = %frame, "Dropping inbound frame");
                }
            },
            SupervisorEvent::Closed => {
                self.set_connection(ConnectionState::Disconnected).await;
                self.set_loading(false).await;
            }
        }
    }

    async fn dispatch(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Welcome(text) | InboundEvent::AssistantReply(text) => {
                self.append(Role::Assistant, text).await;
                self.set_loading(false).await;
            }
            InboundEvent::ChannelError(text) => {
                self.append(Role::System, text).await;
                self.set_loading(false).await;
            }
            InboundEvent::ConnectAck => self.set_connection(ConnectionState::Connected).await,
            InboundEvent::DisconnectNotice => {
                self.set_connection(ConnectionState::Disconnected).await;
                self.append(Role::System, CONNECTION_LOST_NOTICE).await;
                self.set_loading(false).await;
            }
        }
    }

    async fn append(&mut self, role: Role, content: impl Into<String>) {
        let message = self.view.write().await.log.append(role, content).clone();
        self.notify(ChannelEvent::MessageAppended(message));
    }

    async fn set_connection(&mut self, state: ConnectionState) {
        {
            let mut view = self.view.write().await;
            if view.connection == state {
                return;
            }
            view.connection = state;
        }
        self.notify(ChannelEvent::ConnectionChanged(state));
    }

    async fn set_loading(&mut self, loading: bool) {
        {
            let mut view = self.view.write().await;
            if view.loading == loading {
                return;
            }
            view.loading = loading;
        }
        self.notify(ChannelEvent::LoadingChanged(loading));
    }

    fn notify(&mut self, event: ChannelEvent) {
        self.listeners
            .retain(|(_, listener)| listener.send(event.clone()).is_ok());
    }
}
