//! Error types for the Nexus agent
//!
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations. Only `Config` and `Bind` are ever fatal;
//! `Transport` errors are absorbed by the reconnect loop.

use std::net::SocketAddr;

use thiserror::Error;

/// The primary error type for Nexus agent operations.
#[derive(Error, Debug)]
pub enum NexusError {
    /// Configuration-related errors (missing orchestrator URL, bad interval, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Orchestrator link errors (connect refused, reset, send failure, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Health listener could not be bound
    #[error("Failed to bind health listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An injected retry policy declined to schedule another attempt
    #[error("Retry policy gave up after {0} attempts")]
    RetryExhausted(u32),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for Nexus agent operations.
pub type Result<T> = std::result::Result<T, NexusError>;
