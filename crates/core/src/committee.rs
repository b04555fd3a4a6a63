// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Committee arithmetic shared by the ledger and the consensus engine.

use onyx_cryptography::{address_of, CryptoResult, PublicKey};
use onyx_primitives::UInt160;

/// Number of byzantine bookkeepers tolerated by a committee of `n`.
pub const fn max_faulty(n: usize) -> usize {
    n.saturating_sub(1) / 3
}

/// Signature threshold `M = N - f` for a committee of `n`.
pub const fn quorum(n: usize) -> usize {
    n - max_faulty(n)
}

/// Address bound into a header as `next_bookkeeper`: the `M`-of-`N`
/// multi-signature address of `bookkeepers`.
pub fn next_bookkeeper_address(bookkeepers: &[PublicKey]) -> CryptoResult<UInt160> {
    address_of(bookkeepers, quorum(bookkeepers.len()))
}

/// Returns the committee in canonical (sorted, deduplicated) order.
pub fn canonical_order(mut bookkeepers: Vec<PublicKey>) -> Vec<PublicKey> {
    bookkeepers.sort();
    bookkeepers.dedup();
    bookkeepers
}
