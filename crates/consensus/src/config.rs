// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use std::time::Duration;

use onyx_config::{ConsensusSettings, DBFT};
use onyx_core::time::MAX_TIMESTAMP_DRIFT_SECS;
use onyx_cryptography::{PublicKey, MAX_MULTISIG_KEYS};

use crate::{ConsensusError, ConsensusResult};

pub const DEFAULT_BLOCK_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MIN_BOOKKEEPERS: usize = 4;
pub const DEFAULT_MAX_TXS_PER_BLOCK: usize = 1_024;

/// Engine-side consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbftConfig {
    /// Protocol version stamped on payloads and headers.
    pub version: u32,
    pub block_interval: Duration,
    pub min_bookkeepers: usize,
    /// Mempool transactions per proposal, the bookkeeping transaction excluded.
    pub max_txs_per_block: usize,
    /// How far a proposal timestamp may run ahead of the local clock.
    pub max_timestamp_drift_secs: u32,
}

impl Default for DbftConfig {
    fn default() -> Self {
        Self {
            version: 0,
            block_interval: DEFAULT_BLOCK_INTERVAL,
            min_bookkeepers: DEFAULT_MIN_BOOKKEEPERS,
            max_txs_per_block: DEFAULT_MAX_TXS_PER_BLOCK,
            max_timestamp_drift_secs: MAX_TIMESTAMP_DRIFT_SECS,
        }
    }
}

impl DbftConfig {
    pub fn from_settings(settings: &ConsensusSettings) -> ConsensusResult<Self> {
        if settings.consensus_type != DBFT {
            return Err(ConsensusError::Config(format!(
                "consensus_type {:?} is not handled by this engine",
                settings.consensus_type
            )));
        }
        let config = Self {
            block_interval: Duration::from_millis(settings.block_interval_ms),
            min_bookkeepers: settings.min_bookkeepers,
            max_txs_per_block: settings.max_transactions_per_block,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Short intervals and a single-node minimum, for tests.
    pub fn for_testing() -> Self {
        Self {
            block_interval: Duration::from_millis(1_000),
            min_bookkeepers: 1,
            max_txs_per_block: 16,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConsensusResult<()> {
        if self.block_interval.is_zero() {
            return Err(ConsensusError::Config("block interval must be positive".into()));
        }
        if self.min_bookkeepers == 0 || self.min_bookkeepers > MAX_MULTISIG_KEYS {
            return Err(ConsensusError::Config(format!(
                "min_bookkeepers must be within 1..={MAX_MULTISIG_KEYS}"
            )));
        }
        Ok(())
    }

    /// Checks a committee against the configured bounds.
    pub fn check_committee(&self, bookkeepers: &[PublicKey]) -> ConsensusResult<()> {
        if bookkeepers.len() < self.min_bookkeepers {
            return Err(ConsensusError::Config(format!(
                "{} bookkeepers, at least {} required",
                bookkeepers.len(),
                self.min_bookkeepers
            )));
        }
        if bookkeepers.len() > MAX_MULTISIG_KEYS {
            return Err(ConsensusError::Config(format!(
                "{} bookkeepers exceed the multi-signature limit of {MAX_MULTISIG_KEYS}",
                bookkeepers.len()
            )));
        }
        Ok(())
    }
}

/// Decodes the hex bookkeeper keys listed in the settings.
pub fn parse_bookkeepers(settings: &ConsensusSettings) -> ConsensusResult<Vec<PublicKey>> {
    settings
        .bookkeepers
        .iter()
        .map(|key| {
            PublicKey::from_hex(key)
                .map_err(|e| ConsensusError::Config(format!("bookkeeper {key}: {e}")))
        })
        .collect()
}
