// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use crate::hash256;
use onyx_primitives::UInt256;

/// Computes the Merkle root of `hashes` in order.
///
/// Parents are `hash256(left || right)`; an odd trailing node is paired with
/// itself. A single hash is its own root and an empty list yields zero.
pub fn compute_root(hashes: &[UInt256]) -> UInt256 {
    match hashes.len() {
        0 => return UInt256::zero(),
        1 => return hashes[0],
        _ => {}
    }

    let mut level: Vec<UInt256> = hashes.to_vec();
    let mut buffer = [0u8; 64];
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            buffer[..32].copy_from_slice(left.as_bytes());
            buffer[32..].copy_from_slice(right.as_bytes());
            next.push(hash256(&buffer));
        }
        level = next;
    }
    level[0]
}
