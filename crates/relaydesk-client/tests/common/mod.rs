//! In-memory transport for driving a session channel from tests.

#![allow(dead_code)]

use futures::SinkExt;
use futures::channel::mpsc as fmpsc;
use futures::future::BoxFuture;
use relaydesk_client::{ChannelEvent, Connector, Link, Role, Subscription, TransportError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Accept,
    Refuse,
    /// Never completes; only the connect timeout ends it.
    Hang,
}

/// Connector that plays back a fixed list of outcomes, then refuses.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Outcome>>,
    attempts: Mutex<Vec<Instant>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedConnector {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
            peers,
        };
        (connector, rx)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _endpoint: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.attempts.lock().unwrap().push(Instant::now());
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Refuse);

        match outcome {
            Outcome::Refuse => {
                Box::pin(async { Err::<Link, _>(TransportError::Refused("scripted refusal".into())) })
            }
            Outcome::Hang => Box::pin(futures::future::pending::<Result<Link, TransportError>>()),
            Outcome::Accept => {
                let (client_tx, server_rx) = fmpsc::unbounded::<String>();
                let (server_tx, client_rx) = fmpsc::unbounded::<Result<String, TransportError>>();
                let _ = self.peers.send(Peer {
                    received: server_rx,
                    push: server_tx,
                });
                let sink = client_tx.sink_map_err(|_| TransportError::Closed);
                Box::pin(async move { Ok::<_, TransportError>(Link::new(sink, client_rx)) })
            }
        }
    }
}

/// The backend's end of an accepted link. Dropping it closes the link.
pub struct Peer {
    pub received: fmpsc::UnboundedReceiver<String>,
    pub push: fmpsc::UnboundedSender<Result<String, TransportError>>,
}

impl Peer {
    pub fn reply(&self, frame: &str) {
        self.push.unbounded_send(Ok(frame.to_string())).unwrap();
    }

    pub fn fail(&self, error: TransportError) {
        self.push.unbounded_send(Err(error)).unwrap();
    }

    pub async fn next_frame(&mut self) -> Option<String> {
        use futures::StreamExt;
        tokio::time::timeout(Duration::from_secs(60), self.received.next())
            .await
            .ok()
            .flatten()
    }

    /// True if nothing has been transmitted since the last read.
    pub fn is_idle(&mut self) -> bool {
        matches!(self.received.try_next(), Err(_))
    }
}

pub async fn next_event(sub: &mut Subscription) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(120), sub.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel closed")
}

/// Skip events until one matches.
pub async fn wait_for(
    sub: &mut Subscription,
    mut predicate: impl FnMut(&ChannelEvent) -> bool,
) -> ChannelEvent {
    loop {
        let event = next_event(sub).await;
        if predicate(&event) {
            return event;
        }
    }
}

pub async fn wait_connected(sub: &mut Subscription) {
    wait_for(sub, |e| {
        matches!(e, ChannelEvent::ConnectionChanged(state) if state.is_connected())
    })
    .await;
}

pub async fn wait_message(sub: &mut Subscription, role: Role) -> relaydesk_client::Message {
    match wait_for(sub, |e| matches!(e, ChannelEvent::MessageAppended(m) if m.role() == role)).await
    {
        ChannelEvent::MessageAppended(message) => message,
        _ => unreachable!(),
    }
}

/// Drain whatever is already queued on a subscription.
pub fn drain(sub: &mut Subscription) -> Vec<ChannelEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}
