// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Cryptography
//!
//! Cryptographic primitives used by the ledger and the consensus engine:
//!
//! - [`hash256`] / [`hash160`] digests
//! - P-256 [`KeyPair`], [`PublicKey`] and 64-byte [`Signature`]s with
//!   [`sign`] / [`verify`]
//! - [`verify_multi`] for ordered `m`-of-`N` signature sets
//! - redeem scripts and [`address_of`] for committee addresses
//! - the transaction [`merkle::compute_root`]
//!
//! Signature verification is delegated to the `p256` crate, whose scalar
//! arithmetic is constant time.
//!
//! ```rust
//! use onyx_cryptography::{address_of, verify, verify_multi, KeyPair};
//!
//! let keys: Vec<KeyPair> = (1..=4u8)
//!     .map(|i| KeyPair::from_private_key(&[i; 32]).unwrap())
//!     .collect();
//! let publics: Vec<_> = keys.iter().map(|k| k.public_key().clone()).collect();
//!
//! let sig = keys[0].sign(b"msg").unwrap();
//! assert!(verify(keys[0].public_key(), b"msg", &sig));
//!
//! let sigs: Vec<_> = keys[..3].iter().map(|k| k.sign(b"msg").unwrap()).collect();
//! assert!(verify_multi(b"msg", &publics, 3, &sigs));
//!
//! let address = address_of(&publics, 3).unwrap();
//! assert!(!address.is_zero());
//! ```

mod ecdsa;
mod error;
mod hash;
pub mod merkle;
mod multisig;
pub mod script;

pub use ecdsa::{
    sign, verify, KeyPair, PublicKey, Signature, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash160, hash256, ripemd160, sha256};
pub use multisig::{verify_multi, MAX_MULTISIG_KEYS};
pub use script::{address_of, address_of_key};
