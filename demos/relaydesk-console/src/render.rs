//! Prints channel events as they arrive.

use relaydesk_client::{ChannelEvent, ConnectionState, Message, Role, Subscription};

pub async fn run(mut events: Subscription) {
    while let Some(event) = events.recv().await {
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

fn describe(event: &ChannelEvent) -> Option<String> {
    match event {
        ChannelEvent::MessageAppended(message) => Some(format_message(message)),
        ChannelEvent::ConnectionChanged(state) => Some(format!("[{}]", status(*state))),
        ChannelEvent::LoadingChanged(true) => Some("… YAAN is thinking".to_string()),
        ChannelEvent::LoadingChanged(false) => None,
    }
}

fn status(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "Online",
        ConnectionState::Connecting => "Connecting...",
        ConnectionState::Disconnected => "Offline",
    }
}

fn format_message(message: &Message) -> String {
    let who = match message.role() {
        // Echo of the user's own line is noise on a terminal.
        Role::User => return format!("  you {}", message.created_at().format("%H:%M")),
        Role::Assistant => "yaan",
        Role::System => "system",
    };
    format!("{who}> {}", message.content())
}
