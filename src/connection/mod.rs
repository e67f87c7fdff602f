//! Orchestrator connection management
//!
//! This module keeps one logical connection to the orchestrator alive for the
//! lifetime of the agent:
//! - [`ConnectionManager`] drives the reconnect loop and per-session work
//! - [`Connector`] opens the transport (WebSocket in production)
//! - [`RetryPolicy`] decides how long to wait between attempts
//! - [`InboundHandler`] receives messages pushed by the orchestrator
//!
//! # State machine
//!
//! ```text
//!  Disconnected ──► Connecting ──► Connected
//!       ▲               │              │
//!       └──── delay ◄───┴──────────────┘
//! ```

mod dispatch;
mod manager;
mod retry;
mod transport;

use std::fmt;

pub use dispatch::{InboundHandler, LogHandler};
pub use manager::{ConnectionManager, SessionEnd};
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy};
pub use transport::{Connection, Connector, FrameSink, FrameStream, WebSocketConnector};

/// Lifecycle state of the orchestrator link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}
