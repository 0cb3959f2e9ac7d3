//! Configuration for the MaidanIO daemon
//!
//! Loads configuration from a TOML file with the parameters needed for
//! robot discovery and command transmission. All ports and timing values
//! have defaults matching the minibot firmware, so a missing config file
//! is not fatal.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub liveness: LivenessConfig,
    pub logging: LoggingConfig,
}

/// UDP port and addressing configuration
///
/// Both ports are fixed well-known values agreed with the minibot
/// firmware; they are configurable here only for bench setups where
/// simulated robots run on non-standard ports.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Port this daemon listens on for robot discovery pings.
    /// Emergency-stop broadcasts also go out on this port.
    pub discovery_port: u16,

    /// Port each robot listens on for movement/status commands
    pub command_port: u16,

    /// Broadcast address for fleet-wide emergency stop
    pub broadcast_address: String,

    /// Receive timeout for the discovery socket, in milliseconds.
    /// Keeps the discovery loop responsive to shutdown.
    pub receive_timeout_ms: u64,
}

/// Discovery worker timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Interval between discovery polls, in milliseconds
    pub poll_interval_ms: u64,
}

/// Liveness sweeper timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
    /// Interval between staleness sweeps, in milliseconds.
    /// Deliberately coarser than discovery polling to avoid churn.
    pub sweep_interval_ms: u64,

    /// Age after which a robot with no liveness refresh is evicted,
    /// in milliseconds
    pub stale_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log output (stdout or stderr)
    pub output: String,
}

impl NetworkConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LivenessConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for the minibot fleet
    ///
    /// Ports 12345 (discovery) and 2367 (commands) are the values baked
    /// into the minibot firmware.
    pub fn minibot_defaults() -> Self {
        Self {
            network: NetworkConfig {
                discovery_port: 12345,
                command_port: 2367,
                broadcast_address: "255.255.255.255".to_string(),
                receive_timeout_ms: 100,
            },
            discovery: DiscoveryConfig {
                poll_interval_ms: 500,
            },
            liveness: LivenessConfig {
                sweep_interval_ms: 2000,
                stale_timeout_ms: 10_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                output: "stdout".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::minibot_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::minibot_defaults();
        assert_eq!(config.network.discovery_port, 12345);
        assert_eq!(config.network.command_port, 2367);
        assert_eq!(config.network.broadcast_address, "255.255.255.255");
        assert_eq!(config.discovery.poll_interval_ms, 500);
        assert_eq!(config.liveness.stale_timeout_ms, 10_000);
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::minibot_defaults();
        assert_eq!(config.network.receive_timeout(), Duration::from_millis(100));
        assert_eq!(config.discovery.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.liveness.sweep_interval(), Duration::from_secs(2));
        assert_eq!(config.liveness.stale_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::minibot_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should contain all sections
        assert!(toml_string.contains("[network]"));
        assert!(toml_string.contains("[discovery]"));
        assert!(toml_string.contains("[liveness]"));
        assert!(toml_string.contains("[logging]"));

        // Should contain key values
        assert!(toml_string.contains("discovery_port = 12345"));
        assert!(toml_string.contains("command_port = 2367"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[network]
discovery_port = 22345
command_port = 3367
broadcast_address = "192.168.1.255"
receive_timeout_ms = 50

[discovery]
poll_interval_ms = 250

[liveness]
sweep_interval_ms = 1000
stale_timeout_ms = 5000

[logging]
level = "debug"
output = "stderr"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.network.discovery_port, 22345);
        assert_eq!(config.network.broadcast_address, "192.168.1.255");
        assert_eq!(config.liveness.stale_timeout_ms, 5000);
        assert_eq!(config.logging.level, "debug");
    }
}
