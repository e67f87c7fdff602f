//! `run` command - start the connection manager and the health service.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{info, warn};

use nexus_agent::config::{
    parse_interval, AgentConfig, AgentIdentity, ConfigOverrides, PresetRegistry, DEFAULT_PRESET,
};
use nexus_agent::connection::{ConnectionManager, FixedDelay, WebSocketConnector};
use nexus_agent::health;

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Built-in agent preset (comms, research, ops, strategy)
    #[arg(short, long)]
    agent: Option<String>,

    /// JSON file with a full agent identity; replaces the preset
    #[arg(long, conflicts_with = "agent")]
    identity_file: Option<PathBuf>,

    /// Agent display name
    #[arg(long)]
    name: Option<String>,

    /// Status phrase sent with every heartbeat
    #[arg(long)]
    heartbeat_text: Option<String>,

    /// Heartbeat period, e.g. 7s or 1m
    #[arg(long)]
    heartbeat_interval: Option<String>,

    /// Port for GET /agent/health
    #[arg(long)]
    health_port: Option<u16>,

    /// Address for the health listener
    #[arg(long)]
    health_host: Option<IpAddr>,

    /// Pause between reconnect attempts, e.g. 5s
    #[arg(long)]
    reconnect_delay: Option<String>,

    /// Give up on a connect attempt after this long, e.g. 10s
    #[arg(long)]
    connect_timeout: Option<String>,

    /// Orchestrator WebSocket endpoint (overrides ORCHESTRATOR_URL)
    #[arg(long)]
    orchestrator_url: Option<String>,
}

impl RunArgs {
    fn overrides(&self) -> Result<ConfigOverrides> {
        Ok(ConfigOverrides {
            name: self.name.clone(),
            heartbeat_text: self.heartbeat_text.clone(),
            heartbeat_interval: self
                .heartbeat_interval
                .as_deref()
                .map(parse_interval)
                .transpose()?,
            health_port: self.health_port,
            health_host: self.health_host,
            reconnect_delay: self
                .reconnect_delay
                .as_deref()
                .map(parse_interval)
                .transpose()?,
            connect_timeout: self
                .connect_timeout
                .as_deref()
                .map(parse_interval)
                .transpose()?,
            orchestrator_url: self.orchestrator_url.clone(),
        })
    }

    fn base_identity(&self) -> Result<AgentIdentity> {
        if let Some(path) = &self.identity_file {
            return AgentIdentity::load(path)
                .with_context(|| format!("Failed to load identity file {}", path.display()));
        }
        let preset = self.agent.as_deref().unwrap_or(DEFAULT_PRESET);
        Ok(PresetRegistry::new().resolve(preset)?)
    }

    /// Preset or identity file, then environment, then flags.
    pub(crate) fn resolve(&self) -> Result<AgentConfig> {
        let base = self.base_identity()?;
        let overrides = ConfigOverrides::from_env()
            .context("Invalid agent environment")?
            .merge(self.overrides()?);
        Ok(AgentConfig::resolve(base, overrides)?)
    }
}

pub(crate) async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = args.resolve()?;
    let identity = Arc::new(config.identity.clone());

    // Bind before anything else: an agent without its probe is not functional.
    let listener = health::bind(config.health_addr())
        .await
        .context("Health service failed to start")?;

    info!(
        agent = %identity.name,
        interval_secs = identity.heartbeat_interval.as_secs_f64(),
        port = identity.health_port,
        "Starting agent"
    );

    let manager = ConnectionManager::new(
        Arc::clone(&identity),
        Box::new(WebSocketConnector::with_timeout(config.connect_timeout)),
        Box::new(FixedDelay(config.reconnect_delay)),
    );
    let url = config.orchestrator_url.clone();
    let connection = tokio::spawn(async move {
        // A missing URL is logged by the manager; the health probe keeps serving.
        let _ = manager.run(url.as_deref()).await;
    });

    let result = tokio::select! {
        res = health::serve(listener, identity.health_body()) => {
            res.context("Health service stopped")
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    connection.abort();
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_overrides_parse_intervals() {
        let args = RunArgs {
            heartbeat_interval: Some("3s".into()),
            reconnect_delay: Some("250ms".into()),
            connect_timeout: Some("2s".into()),
            health_port: Some(6100),
            ..Default::default()
        };
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides.heartbeat_interval, Some(Duration::from_secs(3)));
        assert_eq!(overrides.reconnect_delay, Some(Duration::from_millis(250)));
        assert_eq!(overrides.connect_timeout, Some(Duration::from_secs(2)));
        assert_eq!(overrides.health_port, Some(6100));
        assert!(overrides.name.is_none());
    }

    #[test]
    fn test_overrides_reject_bad_interval() {
        let args = RunArgs {
            heartbeat_interval: Some("soon".into()),
            ..Default::default()
        };
        assert!(args.overrides().is_err());
    }

    #[test]
    fn test_base_identity_defaults_to_comms() {
        let identity = RunArgs::default().base_identity().unwrap();
        assert_eq!(identity.name, "Comms Agent");
    }

    #[test]
    fn test_base_identity_unknown_preset() {
        let args = RunArgs {
            agent: Some("finance".into()),
            ..Default::default()
        };
        assert!(args.base_identity().is_err());
    }

    #[test]
    fn test_base_identity_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            r#"{"name":"Ledger Agent","heartbeat_text":"Balancing.","heartbeat_interval_secs":9,"health_port":5010}"#,
        )
        .unwrap();

        let args = RunArgs {
            identity_file: Some(path),
            ..Default::default()
        };
        let identity = args.base_identity().unwrap();
        assert_eq!(identity.name, "Ledger Agent");
        assert_eq!(identity.health_port, 5010);
    }

    #[tokio::test]
    async fn test_run_fails_fast_when_health_port_taken() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        // Stands in for the orchestrator; it must never see a connection.
        let orchestrator = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", orchestrator.local_addr().unwrap());

        let args = RunArgs {
            health_host: Some("127.0.0.1".parse().unwrap()),
            health_port: Some(port),
            orchestrator_url: Some(url),
            reconnect_delay: Some("50ms".into()),
            ..Default::default()
        };

        let err = tokio::time::timeout(Duration::from_secs(5), cmd_run(args))
            .await
            .expect("cmd_run should return instead of serving")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Health service failed to start"));

        let attempt = tokio::time::timeout(Duration::from_millis(300), orchestrator.accept()).await;
        assert!(attempt.is_err(), "agent connected despite failed health bind");
        drop(taken);
    }
}
