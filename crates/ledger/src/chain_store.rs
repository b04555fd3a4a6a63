// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! The ledger contract seen by the consensus engine.

use crate::LedgerResult;
use onyx_core::{Block, Header, Transaction};
use onyx_cryptography::PublicKey;
use onyx_primitives::UInt256;
use std::sync::Arc;

/// Result of a successful [`ChainStore::add_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddBlockOutcome {
    /// The block was validated and committed.
    Added,
    /// The block was already committed; nothing changed.
    AlreadyExists,
}

/// Read and append access to the chain.
///
/// Commits are synchronous: when `add_block` returns `Added` the block is
/// durable and `current_height` reflects it. Implementations must not reorder
/// commits relative to their callers.
pub trait ChainStore: Send + Sync {
    /// Height of the latest committed block.
    fn current_height(&self) -> u32;

    /// Hash of the latest committed block.
    fn current_hash(&self) -> UInt256;

    fn header_at(&self, height: u32) -> Option<Header>;

    fn block_at(&self, height: u32) -> Option<Arc<Block>>;

    /// Committee governing `current_height() + 1`, in canonical order.
    fn bookkeepers_for_next(&self) -> Vec<PublicKey>;

    fn add_block(&self, block: &Block) -> LedgerResult<AddBlockOutcome>;

    fn contains_block(&self, hash: &UInt256) -> bool;

    /// Ledger-side transaction check (e.g. not already committed).
    fn verify_tx(&self, transaction: &Transaction) -> LedgerResult<()>;

    /// Block root a header for the next height must carry when its
    /// transaction root is `tx_root`.
    fn block_root_with(&self, tx_root: &UInt256) -> UInt256;
}
