//! Agent Configuration
//!
//! TOML file, every field optional:
//!
//! ```toml
//! [peer]
//! address = "127.0.0.1:8597"
//! timeout_ms = 5000
//!
//! [sync]
//! timers = 4
//! initial_delay_ms = 1000
//! stagger_ms = 15000
//! period_ms = 60000
//!
//! [capture]
//! pending_capacity = 1000
//!
//! [host]
//! call_timeout_ms = 3000
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use snare_peer::{HeartbeatPlan, PeerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSection {
    pub address: String,
    pub timeout_ms: u64,
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8597".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Redundant heartbeat timers
    pub timers: usize,
    pub initial_delay_ms: u64,
    pub stagger_ms: u64,
    pub period_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            timers: 4,
            initial_delay_ms: 1_000,
            stagger_ms: 15_000,
            period_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    /// Unresolved requests kept before the oldest is evicted
    pub pending_capacity: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            pending_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    pub call_timeout_ms: u64,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            call_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full agent configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub peer: PeerSection,
    pub sync: SyncSection,
    pub capture: CaptureSection,
    pub host: HostSection,
    pub log: LogSection,
}

impl AgentConfig {
    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// `$XDG_CONFIG_HOME/snare/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snare").join("config.toml"))
    }

    /// An explicit path must exist; the default path may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_toml_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_toml_file(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peer.address.trim().is_empty() {
            return Err(ConfigError::Invalid("peer.address is empty".into()));
        }
        if self.peer.timeout_ms == 0 {
            return Err(ConfigError::Invalid("peer.timeout_ms must be > 0".into()));
        }
        if self.sync.timers == 0 {
            return Err(ConfigError::Invalid("sync.timers must be > 0".into()));
        }
        if self.sync.period_ms == 0 {
            return Err(ConfigError::Invalid("sync.period_ms must be > 0".into()));
        }
        if self.capture.pending_capacity == 0 {
            return Err(ConfigError::Invalid(
                "capture.pending_capacity must be > 0".into(),
            ));
        }
        if self.host.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("host.call_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            address: self.peer.address.clone(),
            timeout: Duration::from_millis(self.peer.timeout_ms),
            ..Default::default()
        }
    }

    pub fn heartbeat_plan(&self) -> HeartbeatPlan {
        HeartbeatPlan {
            timers: self.sync.timers,
            initial_delay: Duration::from_millis(self.sync.initial_delay_ms),
            stagger: Duration::from_millis(self.sync.stagger_ms),
            period: Duration::from_millis(self.sync.period_ms),
        }
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_millis(self.host.call_timeout_ms)
    }

    /// Export as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
