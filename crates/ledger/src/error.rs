// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Ledger and transaction pool error types

use onyx_primitives::UInt256;
use thiserror::Error;

/// Chain-store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Block already committed at a different position
    #[error("Block already exists: {0}")]
    BlockExists(UInt256),

    /// Invalid block height
    #[error("Invalid block height: expected {expected}, got {actual}")]
    InvalidHeight { expected: u32, actual: u32 },

    /// Invalid previous hash
    #[error("Invalid previous hash: expected {expected}, got {actual}")]
    InvalidPrevHash { expected: UInt256, actual: UInt256 },

    /// Block failed validation
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Transaction rejected by the ledger
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Header not found
    #[error("Header not found at height {0}")]
    HeaderNotFound(u32),

    /// The store cannot accept writes right now; the caller may retry
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Transaction pool errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxPoolError {
    /// Transaction already pooled
    #[error("Transaction already in pool: {0}")]
    Duplicate(UInt256),

    /// Pool is at capacity
    #[error("Transaction pool full (capacity {capacity})")]
    Full { capacity: usize },

    /// Bookkeeping transactions are created by the proposer only
    #[error("Bookkeeping transactions cannot be pooled")]
    BookkeepingNotAllowed,

    /// Verification failed
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

/// Result type for transaction pool operations
pub type TxPoolResult<T> = Result<T, TxPoolError>;
