// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Hash functions used for block, transaction and address digests.

use onyx_primitives::{UInt160, UInt256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes RIPEMD-160 hash of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes Hash160 (RIPEMD-160 of SHA-256) of the input data.
pub fn hash160(data: &[u8]) -> UInt160 {
    UInt160::new(ripemd160(&sha256(data)))
}

/// Computes Hash256 (double SHA-256) of the input data.
///
/// Block, transaction and payload hashes are all Hash256 digests of the
/// respective unsigned encodings.
pub fn hash256(data: &[u8]) -> UInt256 {
    UInt256::new(sha256(&sha256(data)))
}
