//! Node configuration loaded from TOML.
//!
//! ```toml
//! [node]
//! data_dir = "/var/lib/diversity"
//! identifier = "0123456789abcdef-0123456789abcdef-0123456789abcdef-0123456789abcdef"
//! fallback_vote_source = "..."     # optional
//!
//! [freeze]
//! max_candidates_per_height = 10   # any FreezeConfig field; missing keys default
//!
//! [driver]
//! tick_interval_ms = 1000
//! event_channel_capacity = 10000
//!
//! [logging]
//! filter = "info,diversity=debug"
//!
//! [metrics]
//! enabled = true
//! ```

use diversity_freeze::FreezeConfig;
use diversity_types::{HexError, VerifierId};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a [`NodeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing node identifier")]
    MissingIdentifier,

    #[error("Invalid {field}: {source}")]
    InvalidIdentifier {
        field: &'static str,
        #[source]
        source: HexError,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub freeze: FreezeConfig,
    pub driver: DriverConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// `[node]`: identity and on-disk location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Directory holding the vote file.
    ///
    /// Default: `data`
    pub data_dir: PathBuf,

    /// This node's verifier identifier as hex (dashes allowed).
    pub identifier: Option<String>,

    /// Trusted verifier followed while this node has no retained history.
    pub fallback_vote_source: Option<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            identifier: None,
            fallback_vote_source: None,
        }
    }
}

/// `[driver]`: the runner's event loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Period of the consensus tick.
    ///
    /// Default: 1000 ms
    pub tick_interval_ms: u64,

    /// Capacity of the inbound event channel.
    ///
    /// Default: 10,000
    pub event_channel_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            event_channel_capacity: 10_000,
        }
    }
}

impl DriverConfig {
    /// Tick period as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// `[logging]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. `RUST_LOG` takes precedence.
    pub filter: Option<String>,
}

/// `[metrics]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register Prometheus metrics.
    ///
    /// Default: true
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl NodeConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "driver.tick_interval_ms",
                reason: "must be positive",
            });
        }
        if self.driver.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "driver.event_channel_capacity",
                reason: "must be positive",
            });
        }
        if self.freeze.max_candidates_per_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "freeze.max_candidates_per_height",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// The local verifier's identifier.
    pub fn local_identifier(&self) -> Result<VerifierId, ConfigError> {
        let hex = self
            .node
            .identifier
            .as_deref()
            .ok_or(ConfigError::MissingIdentifier)?;
        VerifierId::from_hex(hex).map_err(|source| ConfigError::InvalidIdentifier {
            field: "node.identifier",
            source,
        })
    }

    /// The `[freeze]` table with identities filled in from `[node]`.
    pub fn freeze_config(&self) -> Result<FreezeConfig, ConfigError> {
        let mut freeze = self.freeze.clone();
        freeze.local_identifier = self.local_identifier()?;
        freeze.fallback_vote_source = self
            .node
            .fallback_vote_source
            .as_deref()
            .map(|hex| {
                VerifierId::from_hex(hex).map_err(|source| ConfigError::InvalidIdentifier {
                    field: "node.fallback_vote_source",
                    source,
                })
            })
            .transpose()?;
        Ok(freeze)
    }
}
