//! Transport boundary.
//!
//! A [`Connector`] opens a [`Link`]: a sink and a stream of text frames. The
//! supervisor never sees anything transport-specific beyond that.

use futures_util::future::{self, BoxFuture};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("socket error: {0}")]
    Socket(String),
    #[error("connection closed")]
    Closed,
}

/// An open, bidirectional text-frame connection.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Link {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<String, Error = TransportError> + Send + 'static,
        R: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens links to an endpoint.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            let (ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
                .await
                .map_err(|e| TransportError::Refused(e.to_string()))?;
            let (sink, stream) = ws.split();

            let sink = sink
                .sink_map_err(|e| TransportError::Socket(e.to_string()))
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

            let stream = stream.filter_map(|item| {
                future::ready(match item {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "Server sent close frame");
                        None
                    }
                    Ok(_) => None,
                    Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => None,
                    Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
                })
            });

            Ok(Link::new(sink, stream))
        })
    }
}
