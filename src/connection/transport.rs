//! Orchestrator transport.
//!
//! The connection manager only sees a [`Connection`]: a text sink for
//! heartbeats and a text stream of inbound messages. [`WebSocketConnector`]
//! is the production implementation on top of `tokio-tungstenite`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::config::DEFAULT_CONNECT_TIMEOUT;
use crate::error::{NexusError, Result};

/// Outbound half of a live connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = NexusError> + Send>>;

/// Inbound half of a live connection. The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One open session with the orchestrator, split into its two halves.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Connection {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens connections to the orchestrator.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempts a single connection. Every failure is a `Transport` error.
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// The TCP connect and the WebSocket handshake together must finish within
/// `connect_timeout`, otherwise the attempt fails as a transport error.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                NexusError::Transport(format!(
                    "Timed out connecting to {} after {:?}",
                    url, self.connect_timeout
                ))
            })?
            .map_err(|e| NexusError::Transport(format!("Failed to connect to {}: {}", url, e)))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| NexusError::Transport(format!("Send failed: {}", e)))
            .with(|text: String| future::ready(Ok::<_, NexusError>(Message::Text(text))));

        let stream = read.filter_map(|frame| future::ready(inbound_text(frame)));

        Ok(Connection::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Maps a raw WebSocket frame to inbound text, skipping control frames.
fn inbound_text(frame: std::result::Result<Message, tungstenite::Error>) -> Option<Result<String>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
        Ok(Message::Close(frame)) => {
            debug!(?frame, "Orchestrator sent close frame");
            None
        }
        // Pings are answered by tungstenite itself.
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(NexusError::Transport(e.to_string()))),
    }
}
