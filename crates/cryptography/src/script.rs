// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Redeem scripts and the addresses derived from them.

use crate::{hash160, CryptoError, CryptoResult, PublicKey, MAX_MULTISIG_KEYS, PUBLIC_KEY_SIZE};
use onyx_primitives::UInt160;

pub mod opcode {
    /// Pushes the following byte as an integer.
    pub const PUSHBYTES1: u8 = 0x01;
    /// Pushes the following 33 bytes (a compressed key).
    pub const PUSHBYTES33: u8 = 0x21;
    /// Pushes the following 64 bytes (a signature).
    pub const PUSHBYTES64: u8 = 0x40;
    /// `PUSH1` is `0x51`, up to `PUSH16` at `0x60`.
    pub const PUSH0: u8 = 0x50;
    pub const CHECKSIG: u8 = 0xAC;
    pub const CHECKMULTISIG: u8 = 0xAE;
}

fn emit_push_int(script: &mut Vec<u8>, value: usize) {
    debug_assert!(value <= u8::MAX as usize);
    if (1..=16).contains(&value) {
        script.push(opcode::PUSH0 + value as u8);
    } else {
        script.push(opcode::PUSHBYTES1);
        script.push(value as u8);
    }
}

/// `PUSHBYTES33 <key> CHECKSIG`
pub fn signature_redeem_script(public_key: &PublicKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(PUBLIC_KEY_SIZE + 2);
    script.push(opcode::PUSHBYTES33);
    script.extend_from_slice(public_key.as_bytes());
    script.push(opcode::CHECKSIG);
    script
}

/// `push(m) N×(PUSHBYTES33 <key>) push(N) CHECKMULTISIG` over the keys in
/// canonical (sorted) order.
pub fn multisig_redeem_script(m: usize, public_keys: &[PublicKey]) -> CryptoResult<Vec<u8>> {
    let n = public_keys.len();
    if m == 0 || m > n || n > MAX_MULTISIG_KEYS {
        return Err(CryptoError::InvalidThreshold { m, n });
    }
    let mut sorted: Vec<&PublicKey> = public_keys.iter().collect();
    sorted.sort();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(CryptoError::DuplicateKey);
    }

    let mut script = Vec::with_capacity(n * (PUBLIC_KEY_SIZE + 1) + 5);
    emit_push_int(&mut script, m);
    for key in sorted {
        script.push(opcode::PUSHBYTES33);
        script.extend_from_slice(key.as_bytes());
    }
    emit_push_int(&mut script, n);
    script.push(opcode::CHECKMULTISIG);
    Ok(script)
}

/// Address of the `m`-of-`N` multi-signature script over `public_keys`.
///
/// Independent of the order in which the keys are given.
pub fn address_of(public_keys: &[PublicKey], m: usize) -> CryptoResult<UInt160> {
    Ok(hash160(&multisig_redeem_script(m, public_keys)?))
}

/// Address of a single key's signature script.
pub fn address_of_key(public_key: &PublicKey) -> UInt160 {
    hash160(&signature_redeem_script(public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    fn keys(count: u8) -> Vec<PublicKey> {
        (1..=count)
            .map(|i| KeyPair::from_private_key(&[i; 32]).unwrap().public_key().clone())
            .collect()
    }

    #[test]
    fn signature_script_layout() {
        let key = keys(1).remove(0);
        let script = signature_redeem_script(&key);
        assert_eq!(script.len(), 35);
        assert_eq!(script[0], opcode::PUSHBYTES33);
        assert_eq!(script[34], opcode::CHECKSIG);
    }

    #[test]
    fn multisig_script_layout() {
        let keys = keys(4);
        let script = multisig_redeem_script(3, &keys).unwrap();
        assert_eq!(script[0], opcode::PUSH0 + 3);
        assert_eq!(script[script.len() - 2], opcode::PUSH0 + 4);
        assert_eq!(*script.last().unwrap(), opcode::CHECKMULTISIG);
        assert_eq!(script.len(), 1 + 4 * 34 + 1 + 1);
    }

    #[test]
    fn large_thresholds_use_pushbytes() {
        let keys = keys(20);
        let script = multisig_redeem_script(17, &keys).unwrap();
        assert_eq!(&script[..2], &[opcode::PUSHBYTES1, 17]);
    }

    #[test]
    fn address_is_order_independent() {
        let mut keys = keys(4);
        let a = address_of(&keys, 3).unwrap();
        keys.reverse();
        assert_eq!(address_of(&keys, 3).unwrap(), a);
        assert_ne!(address_of(&keys, 2).unwrap(), a);
    }

    #[test]
    fn invalid_thresholds() {
        let keys = keys(4);
        assert!(address_of(&keys, 0).is_err());
        assert!(address_of(&keys, 5).is_err());
        let dup = vec![keys[0].clone(), keys[0].clone()];
        assert_eq!(address_of(&dup, 1), Err(CryptoError::DuplicateKey));
    }
}
