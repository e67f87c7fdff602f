//! Agent configuration
//!
//! An agent is fully described by an [`AgentIdentity`] plus the handful of
//! deployment knobs in [`AgentConfig`]. Values are layered: a built-in preset
//! (or identity file) first, then environment variables, then CLI flags.

pub mod presets;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, Result};

pub use presets::{PresetRegistry, DEFAULT_PRESET};

/// Environment variable holding the orchestrator WebSocket endpoint.
pub const ENV_ORCHESTRATOR_URL: &str = "ORCHESTRATOR_URL";
pub const ENV_AGENT_NAME: &str = "AGENT_NAME";
pub const ENV_HEARTBEAT_TEXT: &str = "HEARTBEAT_TEXT";
pub const ENV_HEARTBEAT_INTERVAL: &str = "HEARTBEAT_INTERVAL";
pub const ENV_HEALTH_PORT: &str = "HEALTH_PORT";
pub const ENV_HEALTH_HOST: &str = "HEALTH_HOST";
pub const ENV_RECONNECT_DELAY: &str = "RECONNECT_DELAY";
pub const ENV_CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";

/// Delay between a lost session and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on one connect attempt, handshake included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// AgentIdentity
// ============================================================================

/// Immutable description of one agent instance.
///
/// Built once at startup and shared read-only (behind an `Arc`) between the
/// connection manager and the health service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Display name, used as the prefix of every heartbeat.
    pub name: String,

    /// Status phrase announced on every heartbeat.
    pub heartbeat_text: String,

    /// Period between heartbeats while connected.
    #[serde(rename = "heartbeat_interval_secs", with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Port of the local health listener.
    pub health_port: u16,
}

impl AgentIdentity {
    pub fn new(
        name: impl Into<String>,
        heartbeat_text: impl Into<String>,
        heartbeat_interval: Duration,
        health_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            heartbeat_text: heartbeat_text.into(),
            heartbeat_interval,
            health_port,
        }
    }

    /// Loads an identity from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NexusError::Config(format!(
                "Failed to read identity file {}: {}",
                path.display(),
                e
            ))
        })?;
        let identity: Self = serde_json::from_str(&content)?;
        identity.validate()?;
        Ok(identity)
    }

    /// Rejects identities that could never produce a sane heartbeat.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NexusError::Config("Agent name cannot be empty".to_string()));
        }
        if self.heartbeat_text.trim().is_empty() {
            return Err(NexusError::Config(
                "Heartbeat text cannot be empty".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(NexusError::Config(
                "Heartbeat interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The exact text sent to the orchestrator on every heartbeat.
    pub fn heartbeat_message(&self) -> String {
        format!("{}: {}", self.name, self.heartbeat_text)
    }

    /// The fixed body returned by the health route.
    pub fn health_body(&self) -> String {
        format!("{} is alive.", self.name)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// A partial configuration layer. `None` fields leave the layer below intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub heartbeat_text: Option<String>,
    pub heartbeat_interval: Option<Duration>,
    pub health_port: Option<u16>,
    pub health_host: Option<IpAddr>,
    pub reconnect_delay: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub orchestrator_url: Option<String>,
}

impl ConfigOverrides {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through an arbitrary lookup (for testing).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let heartbeat_interval = get(ENV_HEARTBEAT_INTERVAL)
            .map(|v| parse_interval(&v))
            .transpose()?;
        let reconnect_delay = get(ENV_RECONNECT_DELAY)
            .map(|v| parse_interval(&v))
            .transpose()?;
        let connect_timeout = get(ENV_CONNECT_TIMEOUT)
            .map(|v| parse_interval(&v))
            .transpose()?;
        let health_port = get(ENV_HEALTH_PORT)
            .map(|v| {
                v.trim().parse::<u16>().map_err(|_| {
                    NexusError::Config(format!("Invalid {}: {}", ENV_HEALTH_PORT, v))
                })
            })
            .transpose()?;
        let health_host = get(ENV_HEALTH_HOST)
            .map(|v| {
                v.trim().parse::<IpAddr>().map_err(|_| {
                    NexusError::Config(format!("Invalid {}: {}", ENV_HEALTH_HOST, v))
                })
            })
            .transpose()?;

        Ok(Self {
            name: get(ENV_AGENT_NAME),
            heartbeat_text: get(ENV_HEARTBEAT_TEXT),
            heartbeat_interval,
            health_port,
            health_host,
            reconnect_delay,
            connect_timeout,
            orchestrator_url: get(ENV_ORCHESTRATOR_URL),
        })
    }

    /// Stacks `upper` on top of `self`; fields set in `upper` win.
    pub fn merge(self, upper: Self) -> Self {
        Self {
            name: upper.name.or(self.name),
            heartbeat_text: upper.heartbeat_text.or(self.heartbeat_text),
            heartbeat_interval: upper.heartbeat_interval.or(self.heartbeat_interval),
            health_port: upper.health_port.or(self.health_port),
            health_host: upper.health_host.or(self.health_host),
            reconnect_delay: upper.reconnect_delay.or(self.reconnect_delay),
            connect_timeout: upper.connect_timeout.or(self.connect_timeout),
            orchestrator_url: upper.orchestrator_url.or(self.orchestrator_url),
        }
    }
}

// ============================================================================
// AgentConfig
// ============================================================================

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub identity: AgentIdentity,
    /// Orchestrator endpoint. `None` is legal here; the connection manager
    /// reports it and stands down.
    pub orchestrator_url: Option<String>,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub health_host: IpAddr,
}

impl AgentConfig {
    /// Applies `overrides` to a base identity and validates the result.
    pub fn resolve(base: AgentIdentity, overrides: ConfigOverrides) -> Result<Self> {
        let identity = AgentIdentity {
            name: overrides.name.unwrap_or(base.name),
            heartbeat_text: overrides.heartbeat_text.unwrap_or(base.heartbeat_text),
            heartbeat_interval: overrides
                .heartbeat_interval
                .unwrap_or(base.heartbeat_interval),
            health_port: overrides.health_port.unwrap_or(base.health_port),
        };
        identity.validate()?;

        let reconnect_delay = overrides.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY);
        if reconnect_delay.is_zero() {
            return Err(NexusError::Config(
                "Reconnect delay must be greater than zero".to_string(),
            ));
        }

        let connect_timeout = overrides.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(NexusError::Config(
                "Connect timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            identity,
            orchestrator_url: overrides
                .orchestrator_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            reconnect_delay,
            connect_timeout,
            health_host: overrides
                .health_host
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        })
    }

    /// Socket address the health listener binds to.
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::new(self.health_host, self.identity.health_port)
    }
}

/// Parse interval string like "1h", "30m", "15s", "250ms" into a duration.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let invalid = || {
        NexusError::Config(format!(
            "Invalid interval '{}'. Use formats like 1h, 30m, 15s or 250ms",
            s
        ))
    };

    let (digits, scale_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else {
        (s.as_str(), 1_000)
    };

    let n: u64 = digits.trim().parse().map_err(|_| invalid())?;
    n.checked_mul(scale_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
