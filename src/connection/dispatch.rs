//! Inbound message dispatch.

use tracing::info;

/// Receives every text message the orchestrator pushes to this agent.
///
/// The default [`LogHandler`] only records the message. Agents with real
/// domain logic plug their own handler into the connection manager.
pub trait InboundHandler: Send + Sync {
    fn handle(&self, agent: &str, message: &str);
}

/// Logs inbound messages and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl InboundHandler for LogHandler {
    fn handle(&self, agent: &str, message: &str) {
        info!(agent = %agent, message = %message, "Received message from orchestrator");
    }
}
