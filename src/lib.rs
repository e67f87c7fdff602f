//! Nexus agent - a sidecar that keeps one live link to the orchestrator
//! and answers a local liveness probe.

pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod heartbeat;

pub use config::{AgentConfig, AgentIdentity};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{NexusError, Result};
