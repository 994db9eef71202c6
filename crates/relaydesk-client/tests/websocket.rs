//! Session channel against a real WebSocket server on loopback.

use futures_util::{SinkExt, StreamExt};
use relaydesk_client::{ChannelConfig, ChannelEvent, Role, SessionChannel, Subscription};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn next_event(events: &mut Subscription) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel closed")
}

async fn wait_message(events: &mut Subscription, role: Role) -> String {
    loop {
        if let ChannelEvent::MessageAppended(message) = next_event(events).await {
            if message.role() == role {
                return message.content().to_string();
            }
        }
    }
}

#[tokio::test]
async fn talks_to_websocket_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let welcome = json!({"type": "welcome", "message": "Hello!"});
        ws.send(Message::Text(welcome.to_string().into())).await.unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let command: Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(command["type"], "command");
                let reply = json!({"type": "response", "text": format!("echo: {}", command["text"].as_str().unwrap())});
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                break;
            }
        }
        // Drop the socket to force a reconnect.
    });

    let config = ChannelConfig::new(format!("ws://{addr}"));
    let channel = SessionChannel::new(config).unwrap();
    let mut events = channel.subscribe();
    channel.open();

    assert_eq!(wait_message(&mut events, Role::Assistant).await, "Hello!");
    assert!(channel.current_state().await.connected);

    channel.send("ping").await.unwrap();
    assert_eq!(wait_message(&mut events, Role::Assistant).await, "echo: ping");

    server.await.unwrap();
    let notice = wait_message(&mut events, Role::System).await;
    assert_eq!(notice, relaydesk_client::CONNECTION_LOST_NOTICE);
    assert!(!channel.current_state().await.connected);

    channel.close().await;
}

#[tokio::test]
async fn refused_connection_stays_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let channel = SessionChannel::new(ChannelConfig::new(format!("ws://{addr}"))).unwrap();
    let mut events = channel.subscribe();
    channel.open();

    loop {
        if let ChannelEvent::ConnectionChanged(state) = next_event(&mut events).await {
            if state == relaydesk_client::ConnectionState::Disconnected {
                break;
            }
        }
    }
    assert!(channel.current_log().await.is_empty());
    channel.close().await;
}
