//! Heartbeat - periodic liveness announcements to the orchestrator.

mod service;

pub use service::{HeartbeatExit, HeartbeatTask};
