//! Built-in agent presets
//!
//! The fleet ships four agents that differ only in identity. Each preset is
//! addressable by a short key (`comms`, `research`, `ops`, `strategy`) so a
//! deployment can pick one with `--agent <key>` instead of spelling out every
//! field.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{NexusError, Result};

use super::AgentIdentity;

/// Preset used when no `--agent` flag is given.
pub const DEFAULT_PRESET: &str = "comms";

// ============================================================================
// Built-in Presets
// ============================================================================

/// High-frequency status agent.
fn builtin_comms() -> AgentIdentity {
    AgentIdentity::new(
        "Comms Agent",
        "Agent reporting in.",
        Duration::from_secs(5),
        5001,
    )
}

fn builtin_research() -> AgentIdentity {
    AgentIdentity::new(
        "Research Agent",
        "Analyzing new data streams.",
        Duration::from_secs(7),
        5002,
    )
}

fn builtin_ops() -> AgentIdentity {
    AgentIdentity::new(
        "Ops Execution Agent",
        "Executing scheduled server maintenance.",
        Duration::from_secs(10),
        5003,
    )
}

/// Low-frequency planning agent.
fn builtin_strategy() -> AgentIdentity {
    AgentIdentity::new(
        "Strategy Agent",
        "Formulating new long-term objectives.",
        Duration::from_secs(15),
        5004,
    )
}

// ============================================================================
// PresetRegistry
// ============================================================================

/// Lookup table of named agent identities.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: BTreeMap<String, AgentIdentity>,
}

impl PresetRegistry {
    /// Creates a registry pre-populated with the built-in presets.
    pub fn new() -> Self {
        let mut registry = Self {
            presets: BTreeMap::new(),
        };
        registry.register("comms", builtin_comms());
        registry.register("research", builtin_research());
        registry.register("ops", builtin_ops());
        registry.register("strategy", builtin_strategy());
        registry
    }

    /// Registers (or replaces) a preset under `key`.
    pub fn register(&mut self, key: &str, identity: AgentIdentity) {
        self.presets.insert(key.to_string(), identity);
    }

    /// Returns the preset registered under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&AgentIdentity> {
        self.presets.get(key)
    }

    /// Like [`get`](Self::get) but reports unknown keys as configuration errors.
    pub fn resolve(&self, key: &str) -> Result<AgentIdentity> {
        self.get(key).cloned().ok_or_else(|| {
            let known: Vec<&str> = self.presets.keys().map(String::as_str).collect();
            NexusError::Config(format!(
                "Unknown agent preset '{}'. Available: {}",
                key,
                known.join(", ")
            ))
        })
    }

    /// All presets, ordered by key.
    pub fn list(&self) -> Vec<(&str, &AgentIdentity)> {
        self.presets
            .iter()
            .map(|(key, identity)| (key.as_str(), identity))
            .collect()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
