//! Reconnect loop and per-session lifecycle.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AgentIdentity, ENV_ORCHESTRATOR_URL};
use crate::error::{NexusError, Result};
use crate::heartbeat::{HeartbeatExit, HeartbeatTask};

use super::{
    Connection, ConnectionState, Connector, FrameStream, InboundHandler, LogHandler, RetryPolicy,
};

/// Why a connected session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The orchestrator closed the connection.
    Closed,
    /// The transport reported an error while reading.
    Error(String),
    /// The heartbeat could no longer write to the connection.
    HeartbeatStopped(String),
}

impl From<HeartbeatExit> for SessionEnd {
    fn from(exit: HeartbeatExit) -> Self {
        match exit {
            HeartbeatExit::Closed => SessionEnd::Closed,
            HeartbeatExit::SendFailed(reason) => SessionEnd::HeartbeatStopped(reason),
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Closed => write!(f, "connection closed"),
            SessionEnd::Error(e) => write!(f, "transport error: {}", e),
            SessionEnd::HeartbeatStopped(e) => write!(f, "heartbeat stopped: {}", e),
        }
    }
}

/// Keeps exactly one logical connection to the orchestrator alive.
pub struct ConnectionManager {
    identity: Arc<AgentIdentity>,
    connector: Box<dyn Connector>,
    retry: Box<dyn RetryPolicy>,
    handler: Arc<dyn InboundHandler>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        identity: Arc<AgentIdentity>,
        connector: Box<dyn Connector>,
        retry: Box<dyn RetryPolicy>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            identity,
            connector,
            retry,
            handler: Arc::new(LogHandler),
            state,
        }
    }

    /// Replaces the default logging handler for inbound messages.
    pub fn with_handler(mut self, handler: Arc<dyn InboundHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(agent = %self.identity.name, from = %prev, to = %next, "Connection state changed");
        }
    }

    /// Connect and stay connected.
    ///
    /// Without an orchestrator URL this logs a configuration error and returns
    /// at once, without a single connection attempt. Otherwise it loops until
    /// the future is dropped: every failed attempt and every ended session
    /// falls back to `Disconnected`, waits for the retry policy's delay and
    /// tries again. Only a policy that returns `None` ends the loop.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use nexus_agent::config::PresetRegistry;
    /// use nexus_agent::connection::{ConnectionManager, FixedDelay, WebSocketConnector};
    /// use nexus_agent::{ConnectionState, NexusError};
    ///
    /// # tokio_test::block_on(async {
    /// let identity = Arc::new(PresetRegistry::new().resolve("research").unwrap());
    /// let manager = ConnectionManager::new(
    ///     identity,
    ///     Box::new(WebSocketConnector::new()),
    ///     Box::new(FixedDelay(Duration::from_secs(5))),
    /// );
    ///
    /// let result = manager.run(None).await;
    /// assert!(matches!(result, Err(NexusError::Config(_))));
    /// assert_eq!(manager.state(), ConnectionState::Disconnected);
    /// # })
    /// ```
    pub async fn run(&self, orchestrator_url: Option<&str>) -> Result<()> {
        let agent = self.identity.name.as_str();

        let Some(url) = orchestrator_url.map(str::trim).filter(|url| !url.is_empty()) else {
            error!(
                agent = %agent,
                "{} environment variable not set. Cannot connect.",
                ENV_ORCHESTRATOR_URL
            );
            return Err(NexusError::Config(format!(
                "{} is not set",
                ENV_ORCHESTRATOR_URL
            )));
        };

        let mut attempt: u32 = 0;
        loop {
            self.set_state(ConnectionState::Connecting);
            info!(agent = %agent, url = %url, "Attempting to connect to orchestrator");

            match self.connector.connect(url).await {
                Ok(connection) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    let end = self.run_session(connection).await;
                    info!(agent = %agent, reason = %end, "Disconnected from orchestrator");
                }
                Err(e) => {
                    warn!(agent = %agent, url = %url, "Orchestrator connection error: {}", e);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            attempt = attempt.saturating_add(1);

            let Some(delay) = self.retry.next_delay(attempt) else {
                error!(agent = %agent, attempt, "Retry policy exhausted, no further reconnects");
                return Err(NexusError::RetryExhausted(attempt));
            };
            info!(
                agent = %agent,
                attempt,
                "Reconnecting in {:.1} seconds...",
                delay.as_secs_f64()
            );
            sleep(delay).await;
        }
    }

    async fn run_session(&self, connection: Connection) -> SessionEnd {
        let span = info_span!("session", id = %Uuid::new_v4(), agent = %self.identity.name);

        async move {
            let Connection { sink, mut stream } = connection;
            info!("Connection to orchestrator established");

            let mut heartbeat = HeartbeatTask::spawn(
                self.identity.heartbeat_message(),
                self.identity.heartbeat_interval,
                sink,
            );

            let end = tokio::select! {
                end = Self::listen(&mut stream, self.handler.as_ref(), &self.identity.name) => end,
                exit = heartbeat.exited() => SessionEnd::from(exit),
            };

            // The heartbeat must be gone before the caller reports Disconnected.
            heartbeat.stop().await;
            end
        }
        .instrument(span)
        .await
    }

    async fn listen(
        stream: &mut FrameStream,
        handler: &dyn InboundHandler,
        agent: &str,
    ) -> SessionEnd {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(text) => handler.handle(agent, &text),
                Err(e) => return SessionEnd::Error(e.to_string()),
            }
        }
        SessionEnd::Closed
    }
}
