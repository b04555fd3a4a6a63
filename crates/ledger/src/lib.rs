// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Ledger
//!
//! The chain-store adapter and transaction pool the consensus engine talks
//! to.
//!
//! - [`ChainStore`]: read the tip, validate and commit blocks
//! - [`MemoryChainStore`]: in-memory store publishing
//!   [`onyx_core::LedgerEvent::BlockPersisted`] after each commit
//! - [`TxPool`] and [`MemoryPool`]: proposal source and transaction verifier

pub mod chain_store;
pub mod error;
pub mod memory_store;
pub mod mempool;

pub use chain_store::{AddBlockOutcome, ChainStore};
pub use error::{LedgerError, LedgerResult, TxPoolError, TxPoolResult};
pub use memory_store::MemoryChainStore;
pub use mempool::{DefaultTxVerifier, MemoryPool, TxPool, TxVerifier};
