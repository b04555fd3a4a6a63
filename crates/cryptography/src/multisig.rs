// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use crate::{verify, PublicKey, Signature};

/// Upper bound on the number of keys in a multi-signature set.
pub const MAX_MULTISIG_KEYS: usize = 24;

/// Verifies an `m`-of-`N` multi-signature.
///
/// Requires `m <= signatures.len() <= public_keys.len() <= 24`. Signatures
/// must appear in the same relative order as the keys they match; each key
/// can satisfy at most one signature, so a repeated signature never counts
/// twice. Duplicate keys are rejected outright.
pub fn verify_multi(
    message: &[u8],
    public_keys: &[PublicKey],
    m: usize,
    signatures: &[Signature],
) -> bool {
    let n = public_keys.len();
    let k = signatures.len();
    if m == 0 || m > k || k > n || n > MAX_MULTISIG_KEYS {
        return false;
    }
    for (i, key) in public_keys.iter().enumerate() {
        if public_keys[..i].contains(key) {
            return false;
        }
    }

    let (mut i, mut j) = (0usize, 0usize);
    while i < k && j < n {
        if verify(&public_keys[j], message, &signatures[i]) {
            i += 1;
        }
        j += 1;
        // Not enough keys left for the unmatched signatures.
        if k - i > n - j {
            return false;
        }
    }
    i == k
}
