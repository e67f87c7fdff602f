//! Per-session heartbeat task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, Instrument};

use crate::connection::FrameSink;

/// Why a heartbeat loop stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The session flag was cleared before the next send.
    Closed,
    /// The connection refused a send; it is no longer open.
    SendFailed(String),
}

/// Background task that announces the agent on a fixed period.
///
/// Owns the write half of exactly one connection. The session clears the
/// shared `open` flag and calls [`stop`](Self::stop) before it reports the
/// connection as gone, so a heartbeat never reaches a superseded handle.
/// Dropping the task aborts it.
pub struct HeartbeatTask {
    open: Arc<AtomicBool>,
    handle: Option<JoinHandle<HeartbeatExit>>,
}

impl HeartbeatTask {
    /// Spawn the heartbeat loop. The first heartbeat goes out immediately.
    pub fn spawn(message: String, interval: Duration, sink: FrameSink) -> Self {
        let open = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&open);

        debug!(interval_ms = interval.as_millis() as u64, "Heartbeat task started");
        let handle = tokio::spawn(
            Self::beat(message, interval, sink, flag).instrument(tracing::Span::current()),
        );

        Self {
            open,
            handle: Some(handle),
        }
    }

    async fn beat(
        message: String,
        interval: Duration,
        mut sink: FrameSink,
        open: Arc<AtomicBool>,
    ) -> HeartbeatExit {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if !open.load(Ordering::SeqCst) {
                return HeartbeatExit::Closed;
            }

            if let Err(e) = sink.send(message.clone()).await {
                debug!("Heartbeat send failed, stopping: {}", e);
                return HeartbeatExit::SendFailed(e.to_string());
            }
            debug!("Heartbeat sent");
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.handle.is_some()
    }

    /// Resolves when the loop exits on its own. Pending forever once the task
    /// has already been joined or stopped, so it is safe inside `select!`.
    pub async fn exited(&mut self) -> HeartbeatExit {
        let Some(handle) = self.handle.as_mut() else {
            return futures::future::pending().await;
        };
        let exit = match handle.await {
            Ok(exit) => exit,
            Err(e) => HeartbeatExit::SendFailed(format!("heartbeat task failed: {}", e)),
        };
        self.handle = None;
        exit
    }

    /// Clear the session flag, abort the loop and wait for it to finish.
    pub async fn stop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("Heartbeat task stopped");
        }
    }
}

impl Drop for HeartbeatTask {
    fn drop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
