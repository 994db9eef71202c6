//! Line-oriented front end for a session channel.
//!
//!   cargo run -p relaydesk-console -- --endpoint ws://localhost:8000/ws
//!
//! Type a line to send it. `/1`..`/5` send a quick suggestion, `/quit` exits.

mod render;

use clap::Parser;
use relaydesk_client::{ChannelConfig, ReconnectConfig, SendError, SessionChannel, WireFormat};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const SUGGESTIONS: &[&str] = &[
    "⏰ What time is it?",
    "✅ Show my todos",
    "💻 What is recursion?",
    "📋 Task summary",
    "😄 Tell me a joke",
];

#[derive(Debug, Parser)]
#[command(name = "relaydesk-console", about = "Chat with the assistant from a terminal")]
struct Args {
    /// TOML file with channel settings. Flags override it.
    #[arg(long, env = "RELAYDESK_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "RELAYDESK_ENDPOINT")]
    endpoint: Option<String>,
    /// Speak the named-event wire format instead of typed frames.
    #[arg(long)]
    event_channel: bool,
    /// Use bounded exponential backoff instead of a fixed retry delay.
    #[arg(long)]
    backoff: bool,
}

impl Args {
    fn channel_config(&self) -> anyhow::Result<ChannelConfig> {
        let mut config = match &self.config {
            Some(path) => ChannelConfig::load(path)?,
            None => ChannelConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if self.event_channel {
            config.wire_format = WireFormat::EventChannel;
        }
        if self.backoff {
            config.reconnect = ReconnectConfig::backoff();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Suggestion text without its leading emoji and spacing.
fn suggestion_text(suggestion: &str) -> &str {
    suggestion
        .trim_start_matches(|c: char| !c.is_ascii_alphabetic())
        .trim()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relaydesk_client=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.channel_config()?;
    tracing::info!("Connecting to {}", config.endpoint);

    let channel = SessionChannel::new(config)?;
    let renderer = tokio::spawn(render::run(channel.subscribe()));
    channel.open();

    println!("Quick suggestions:");
    for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
        println!("  /{} {}", index + 1, suggestion);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = match line.trim() {
            "/quit" => break,
            command if command.starts_with('/') => {
                let picked = command[1..]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| SUGGESTIONS.get(n.wrapping_sub(1)));
                match picked {
                    Some(suggestion) => suggestion_text(suggestion).to_string(),
                    None => {
                        println!("Unknown command: {command}");
                        continue;
                    }
                }
            }
            _ => line.clone(),
        };

        match channel.send(text).await {
            Ok(()) => {}
            Err(SendError::Empty) => {}
            Err(SendError::NotConnected) => {
                println!("(not connected yet, message not sent)");
            }
        }
    }

    channel.close().await;
    drop(channel);
    renderer.await?;
    Ok(())
}
