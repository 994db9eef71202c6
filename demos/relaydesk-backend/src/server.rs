//! Assistant backend implementation.

use crate::protocol::{ServerCodec, WELCOME};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    pub codec: ServerCodec,
    /// Hang up after this many replies, to exercise client reconnects.
    pub drop_after: Option<usize>,
}

/// Shared server state.
#[derive(Default)]
struct ServerState {
    active: usize,
    commands: u64,
}

type SharedState = Arc<RwLock<ServerState>>;

pub async fn run(addr: SocketAddr, options: ServerOptions) -> anyhow::Result<()> {
    let state = SharedState::default();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, client_addr, state, options).await {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedState,
    options: ServerOptions,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    {
        let mut s = state.write().await;
        s.active += 1;
        tracing::info!("Client {} connected. Active connections: {}", addr, s.active);
    }

    let codec = options.codec;
    sink.send(Message::Text(codec.welcome(WELCOME).into())).await?;

    let mut replies = 0;
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
        };

        let Some(command) = codec.command(text.as_str()) else {
            tracing::warn!("Ignoring unexpected frame: {}", text.as_str());
            continue;
        };

        let reply = if command.trim().is_empty() {
            codec.error("I didn't catch that. Please type a command.")
        } else {
            state.write().await.commands += 1;
            codec.reply(&respond(&command))
        };
        sink.send(Message::Text(reply.into())).await?;

        replies += 1;
        if options.drop_after.is_some_and(|limit| replies >= limit) {
            tracing::info!("Dropping {} after {} replies", addr, replies);
            break;
        }
    }

    {
        let mut s = state.write().await;
        s.active -= 1;
        tracing::info!(
            "Client {} disconnected. Active connections: {}, commands served: {}",
            addr,
            s.active,
            s.commands
        );
    }
    Ok(())
}

/// Canned answers; anything else is echoed.
fn respond(command: &str) -> String {
    let lower = command.to_lowercase();
    if lower.contains("time") {
        format!("It's {}.", chrono::Local::now().format("%H:%M"))
    } else if lower.contains("joke") {
        "Why do programmers prefer dark mode? Because light attracts bugs.".to_string()
    } else if lower.starts_with("hello") || lower.starts_with("hi") {
        "Hi! What can I do for you?".to_string()
    } else {
        format!("You said: {}", command.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_and_echo_replies() {
        assert!(respond("What time is it?").starts_with("It's "));
        assert!(respond("tell me a JOKE").contains("bugs"));
        assert_eq!(respond("hello there"), "Hi! What can I do for you?");
        assert_eq!(respond("  show my todos "), "You said: show my todos");
    }
}
