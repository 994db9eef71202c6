//! Connection supervisor.
//!
//! Owns the one transport link and the lifecycle state machine:
//!
//! ```text
//! Disconnected --open--> Connecting --opened--> Connected
//!      ^                     |                     |
//!      +--- failed (retry) --+                     |
//!      +--- lost (notice, retry) ------------------+
//!      +--- close (no retry) from any state
//! ```
//!
//! The supervisor never runs on its own. Link tasks and the retry timer post
//! [`SupervisorInput`]s to a queue; whoever owns the supervisor drains that
//! queue and feeds each input to [`Supervisor::handle`], so every transition
//! happens on the owner's task.

use crate::policy::{ReconnectPolicy, ReconnectStrategy, RetryDecision};
use crate::timer::{RetryTick, RetryTimer};
use crate::transport::{Connector, Link, TransportError};
use futures_util::{SinkExt, StreamExt};
use relaydesk_core::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The link is not open; nothing was transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not connected")]
pub struct NotConnected;

#[derive(Debug)]
pub enum SupervisorInput {
    Link { epoch: u64, event: LinkEvent },
    RetryDue(RetryTick),
}

impl From<RetryTick> for SupervisorInput {
    fn from(tick: RetryTick) -> Self {
        SupervisorInput::RetryDue(tick)
    }
}

/// Reported by a link task.
#[derive(Debug)]
pub enum LinkEvent {
    Opened,
    OpenFailed(TransportError),
    Frame(String),
    /// The link ended without the supervisor asking. `None` is a clean EOF.
    Closed(Option<TransportError>),
}

/// What the owner needs to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Connecting {
        attempt: u32,
    },
    Connected,
    AttemptFailed {
        error: TransportError,
        retry_in: Duration,
    },
    /// An open link dropped; a retry is scheduled.
    Lost {
        error: Option<TransportError>,
        retry_in: Duration,
    },
    /// The retry budget ran out; nothing is scheduled.
    Exhausted {
        error: TransportError,
        attempts: u32,
    },
    Frame(String),
    /// Caller-initiated shutdown.
    Closed,
}

struct LinkHandle {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

pub struct Supervisor {
    connector: Arc<dyn Connector>,
    endpoint: String,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    timer: RetryTimer,
    state: ConnectionState,
    epoch: u64,
    link: Option<LinkHandle>,
    inputs: mpsc::UnboundedSender<SupervisorInput>,
}

impl Supervisor {
    /// Build a supervisor and the queue its link tasks and timer report to.
    pub fn new(
        connector: Arc<dyn Connector>,
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        strategy: ReconnectStrategy,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorInput>) {
        let (inputs, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            connector,
            endpoint: endpoint.into(),
            connect_timeout,
            policy: ReconnectPolicy::new(strategy),
            timer: RetryTimer::new(),
            state: ConnectionState::Disconnected,
            epoch: 0,
            link: None,
            inputs,
        };
        (supervisor, rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start a fresh session. No-op while connecting or connected.
    pub fn open(&mut self) -> Vec<SupervisorEvent> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "open ignored");
            return Vec::new();
        }
        self.timer.cancel();
        self.policy.reset();
        vec![self.begin_attempt()]
    }

    /// Caller-initiated shutdown. Cancels any pending retry and in-flight
    /// attempt; events already queued for the old link are ignored.
    pub fn close(&mut self) -> Vec<SupervisorEvent> {
        let canceled_retry = self.timer.cancel();
        self.drop_link();
        self.epoch += 1;

        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        tracing::info!(?previous, canceled_retry, "Session closed");
        if previous == ConnectionState::Disconnected {
            Vec::new()
        } else {
            vec![SupervisorEvent::Closed]
        }
    }

    /// True when the link is open and its task still takes frames. A link
    /// can end before its close report has been handled.
    pub fn can_transmit(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.link.as_ref().is_some_and(|link| !link.outbound.is_closed())
    }

    /// Queue a frame on the open link.
    pub fn transmit(&mut self, frame: String) -> Result<(), NotConnected> {
        if self.state != ConnectionState::Connected {
            return Err(NotConnected);
        }
        let link = self.link.as_ref().ok_or(NotConnected)?;
        link.outbound.send(frame).map_err(|_| NotConnected)
    }

    pub fn handle(&mut self, input: SupervisorInput) -> Vec<SupervisorEvent> {
        match input {
            SupervisorInput::RetryDue(tick) => {
                if !self.timer.fire(tick) || self.state != ConnectionState::Disconnected {
                    return Vec::new();
                }
                vec![self.begin_attempt()]
            }
            SupervisorInput::Link { epoch, event } => {
                if epoch != self.epoch {
                    tracing::trace!(epoch, current = self.epoch, "dropping event from stale link");
                    return Vec::new();
                }
                self.handle_link(event)
            }
        }
    }

    fn handle_link(&mut self, event: LinkEvent) -> Vec<SupervisorEvent> {
        match (self.state, event) {
            (ConnectionState::Connecting, LinkEvent::Opened) => {
                self.state = ConnectionState::Connected;
                self.policy.reset();
                tracing::info!(endpoint = %self.endpoint, "Connected");
                vec![SupervisorEvent::Connected]
            }
            (ConnectionState::Connecting, LinkEvent::OpenFailed(error)) => {
                self.state = ConnectionState::Disconnected;
                self.link = None;
                match self.policy.record_failure() {
                    RetryDecision::RetryAfter(retry_in) => {
                        tracing::warn!(
                            %error,
                            attempt = self.policy.attempt(),
                            "Connect failed, retrying in {}ms",
                            retry_in.as_millis()
                        );
                        self.timer.schedule(retry_in, self.inputs.clone());
                        vec![SupervisorEvent::AttemptFailed { error, retry_in }]
                    }
                    RetryDecision::Exhausted { attempts } => {
                        tracing::warn!(%error, attempts, "Connect failed, giving up");
                        vec![SupervisorEvent::Exhausted { error, attempts }]
                    }
                }
            }
            (ConnectionState::Connected, LinkEvent::Frame(frame)) => {
                vec![SupervisorEvent::Frame(frame)]
            }
            (ConnectionState::Connected, LinkEvent::Closed(error)) => {
                self.state = ConnectionState::Disconnected;
                self.link = None;
                let retry_in = self.policy.next_delay();
                match &error {
                    Some(e) => tracing::warn!(%e, "Connection lost, retrying in {}ms", retry_in.as_millis()),
                    None => tracing::info!("Connection closed by server, retrying in {}ms", retry_in.as_millis()),
                }
                self.timer.schedule(retry_in, self.inputs.clone());
                vec![SupervisorEvent::Lost { error, retry_in }]
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "ignoring link event");
                Vec::new()
            }
        }
    }

    fn begin_attempt(&mut self) -> SupervisorEvent {
        self.drop_link();
        self.epoch += 1;
        self.state = ConnectionState::Connecting;

        let attempt = self.policy.attempt() + 1;
        tracing::debug!(endpoint = %self.endpoint, attempt, "Connecting");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            self.connector.clone(),
            self.endpoint.clone(),
            self.connect_timeout,
            self.epoch,
            self.inputs.clone(),
            outbound_rx,
        ));
        self.link = Some(LinkHandle { outbound, task });
        SupervisorEvent::Connecting { attempt }
    }

    /// Release the link. An open link is closed gracefully once its outbound
    /// queue drains; an attempt still connecting is aborted.
    fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            if self.state == ConnectionState::Connecting {
                link.task.abort();
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.timer.cancel();
        self.drop_link();
    }
}

async fn run_link(
    connector: Arc<dyn Connector>,
    endpoint: String,
    connect_timeout: Duration,
    epoch: u64,
    inputs: mpsc::UnboundedSender<SupervisorInput>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let report = |event| {
        let _ = inputs.send(SupervisorInput::Link { epoch, event });
    };

    let link = match tokio::time::timeout(connect_timeout, connector.connect(&endpoint)).await {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => return report(LinkEvent::OpenFailed(e)),
        Err(_) => return report(LinkEvent::OpenFailed(TransportError::Timeout(connect_timeout))),
    };
    report(LinkEvent::Opened);

    let Link {
        mut sink,
        mut stream,
    } = link;
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        return report(LinkEvent::Closed(Some(e)));
                    }
                }
                None => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!(%e, "error while closing link");
                    }
                    return;
                }
            },
            item = stream.next() => match item {
                Some(Ok(frame)) => report(LinkEvent::Frame(frame)),
                Some(Err(e)) => return report(LinkEvent::Closed(Some(e))),
                None => return report(LinkEvent::Closed(None)),
            },
        }
    }
}
