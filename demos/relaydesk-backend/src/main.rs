//! Stand-in assistant backend.
//!
//! Greets each connection and answers `command` frames, speaking either wire
//! shape. Useful for running the console against something real:
//!
//!   cargo run -p relaydesk-backend -- --port 8000
//!   cargo run -p relaydesk-backend -- --port 8000 --format event-channel --drop-after 3

mod protocol;
mod server;

use clap::{Parser, ValueEnum};
use protocol::ServerCodec;
use relaydesk_core::WireFormat;
use server::ServerOptions;
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    TypedFrame,
    EventChannel,
}

impl From<Format> for WireFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::TypedFrame => WireFormat::TypedFrame,
            Format::EventChannel => WireFormat::EventChannel,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "relaydesk-backend", about = "Stand-in assistant backend")]
struct Args {
    #[arg(long, env = "RELAYDESK_HOST", default_value = "127.0.0.1")]
    host: IpAddr,
    #[arg(long, env = "RELAYDESK_PORT", default_value_t = 8000)]
    port: u16,
    #[arg(long, value_enum, default_value_t = Format::TypedFrame)]
    format: Format,
    /// Hang up on each client after this many replies.
    #[arg(long)]
    drop_after: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relaydesk_backend=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);
    let options = ServerOptions {
        codec: ServerCodec::new(args.format.into()),
        drop_after: args.drop_after,
    };

    tracing::info!("Starting assistant backend on {} ({:?})", addr, args.format);
    if let Some(limit) = args.drop_after {
        tracing::info!("Clients are dropped after {} replies", limit);
    }

    server::run(addr, options).await
}
