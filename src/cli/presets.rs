//! `presets` command - list the built-in agent identities.

use nexus_agent::config::{PresetRegistry, DEFAULT_PRESET};

pub(crate) fn cmd_presets() {
    let registry = PresetRegistry::new();

    println!("Built-in agents:");
    println!();
    for (key, identity) in registry.list() {
        let marker = if key == DEFAULT_PRESET { " (default)" } else { "" };
        println!("  {}{}", key, marker);
        println!("    name:      {}", identity.name);
        println!("    heartbeat: {}", identity.heartbeat_message());
        println!("    interval:  {}s", identity.heartbeat_interval.as_secs());
        println!("    port:      {}", identity.health_port);
    }
}
