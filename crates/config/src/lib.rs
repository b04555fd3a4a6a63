// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Node configuration
//!
//! Settings are read from TOML. Every field has a default, so an empty file
//! is a valid configuration:
//!
//! ```toml
//! [consensus]
//! consensus_type = "dbft"
//! block_interval_ms = 2000
//! min_bookkeepers = 4
//! bookkeepers = ["02…", "03…"]
//!
//! [network]
//! outbox_capacity = 1024
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The only consensus engine this node runs.
pub const DBFT: &str = "dbft";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub consensus: ConsensusSettings,

    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Consensus engine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSettings {
    /// Selects the engine; only `"dbft"` is recognised
    #[serde(default = "default_consensus_type")]
    pub consensus_type: String,

    /// Base timer for proposer wait and backup backoff
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Refuse to start with a smaller committee
    #[serde(default = "default_min_bookkeepers")]
    pub min_bookkeepers: usize,

    /// Mempool transactions pulled into one proposal, excluding the
    /// bookkeeping transaction
    #[serde(default = "default_max_transactions_per_block")]
    pub max_transactions_per_block: usize,

    /// Committee public keys, hex encoded compressed points
    #[serde(default)]
    pub bookkeepers: Vec<String>,
}

/// Transport parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Outbound payloads buffered per node before the oldest is dropped
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
    Json,
}

/// Logging parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_consensus_type() -> String {
    DBFT.to_string()
}

fn default_block_interval_ms() -> u64 {
    2_000
}

fn default_min_bookkeepers() -> usize {
    4
}

fn default_max_transactions_per_block() -> usize {
    1_024
}

fn default_outbox_capacity() -> usize {
    1_024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            consensus_type: default_consensus_type(),
            block_interval_ms: default_block_interval_ms(),
            min_bookkeepers: default_min_bookkeepers(),
            max_transactions_per_block: default_max_transactions_per_block(),
            bookkeepers: Vec::new(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl NodeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from file
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Saves configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks values that deserialise but cannot run.
    pub fn validate(&self) -> ConfigResult<()> {
        let consensus = &self.consensus;
        if consensus.consensus_type != DBFT {
            return Err(ConfigError::Invalid(format!(
                "unsupported consensus_type {:?}, expected {DBFT:?}",
                consensus.consensus_type
            )));
        }
        if consensus.block_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "block_interval_ms must be positive".into(),
            ));
        }
        if consensus.min_bookkeepers == 0 {
            return Err(ConfigError::Invalid(
                "min_bookkeepers must be positive".into(),
            ));
        }
        if !consensus.bookkeepers.is_empty()
            && consensus.bookkeepers.len() < consensus.min_bookkeepers
        {
            return Err(ConfigError::Invalid(format!(
                "{} bookkeepers configured, at least {} required",
                consensus.bookkeepers.len(),
                consensus.min_bookkeepers
            )));
        }
        for key in &consensus.bookkeepers {
            let digits = key.trim_start_matches("0x");
            if digits.len() != 66 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "bookkeeper key {key:?} is not a 33-byte hex compressed point"
                )));
            }
        }
        if self.network.outbox_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbox_capacity must be positive".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging level is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str = "036b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296";

    #[test]
    fn empty_document_uses_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.consensus.consensus_type, "dbft");
        assert_eq!(config.consensus.block_interval_ms, 2_000);
        assert_eq!(config.consensus.min_bookkeepers, 4);
        assert_eq!(config.network.outbox_capacity, 1_024);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parses_sections() {
        let config = NodeConfig::from_toml_str(
            r#"
            [consensus]
            block_interval_ms = 500
            min_bookkeepers = 1
            bookkeepers = ["036b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"]

            [network]
            outbox_capacity = 64

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.consensus.block_interval_ms, 500);
        assert_eq!(config.consensus.bookkeepers, vec![KEY.to_string()]);
        assert_eq!(config.network.outbox_capacity, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_other_engines() {
        let err = NodeConfig::from_toml_str("[consensus]\nconsensus_type = \"solo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_small_committee_and_bad_keys() {
        let mut config = NodeConfig::default();
        config.consensus.bookkeepers = vec![KEY.to_string(); 3];
        assert!(config.validate().is_err());

        config.consensus.min_bookkeepers = 3;
        assert!(config.validate().is_ok());

        config.consensus.bookkeepers[0] = "zz".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        let err = NodeConfig::from_toml_str("[logging]\nformat = \"xml\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onyx.toml");
        let mut config = NodeConfig::default();
        config.consensus.block_interval_ms = 1_000;
        config.logging.format = LogFormat::Compact;
        config.save_to_file(&path).unwrap();
        assert_eq!(NodeConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn load_reports_missing_file_and_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            NodeConfig::load_from_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[consensus").unwrap();
        assert!(matches!(
            NodeConfig::load_from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
