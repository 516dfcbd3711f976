//! Configuration file support for rstpd
//!
//! Loads and validates rstpd configuration from TOML files.
//! Default location: /etc/sonic/rstpd.toml
//!
//! ```toml
//! [daemon]
//! tick_ms = 200
//!
//! [bridge]
//! address = "02:00:00:00:00:01"
//! priority = 32768
//! port_count = 8
//!
//! [[bridge.port]]
//! index = 0
//! admin_edge = true
//!
//! # Management port, left out of spanning tree
//! [[bridge.port]]
//! index = 7
//! stp_enabled = false
//! ```

use crate::error::{Result, RstpdError};
use serde::{Deserialize, Serialize};
use sonic_rstp::BridgeConfig;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/rstpd.toml";

/// Runtime settings of the daemon itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Protocol tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Wait between attempts when the transport is busy
    #[serde(default = "default_tx_retry_ms")]
    pub tx_retry_ms: u64,

    /// Send attempts per frame before it is dropped
    #[serde(default = "default_tx_retry_attempts")]
    pub tx_retry_attempts: u32,

    /// Frames the engine may queue ahead of the sender task
    #[serde(default = "default_tx_queue_depth")]
    pub tx_queue_depth: usize,
}

/// Complete rstpd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSection,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_tick_ms() -> u64 {
    200
}

fn default_tx_retry_ms() -> u64 {
    50
}

fn default_tx_retry_attempts() -> u32 {
    3
}

fn default_tx_queue_depth() -> usize {
    256
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            tx_retry_ms: default_tx_retry_ms(),
            tx_retry_attempts: default_tx_retry_attempts(),
            tx_queue_depth: default_tx_queue_depth(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                RstpdError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(RstpdError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            RstpdError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.tick_ms)
    }

    pub fn tx_retry_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.tx_retry_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.daemon.tick_ms == 0 {
            return Err(RstpdError::Configuration(
                "tick_ms must be > 0".to_string(),
            ));
        }
        if self.daemon.tx_retry_attempts == 0 {
            return Err(RstpdError::Configuration(
                "tx_retry_attempts must be > 0".to_string(),
            ));
        }
        if self.daemon.tx_queue_depth == 0 {
            return Err(RstpdError::Configuration(
                "tx_queue_depth must be > 0".to_string(),
            ));
        }
        if self.bridge.address.is_zero() {
            return Err(RstpdError::Configuration(
                "bridge address is not set".to_string(),
            ));
        }
        self.bridge.validate()?;
        Ok(())
    }
}
