// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use thiserror::Error;

/// Errors raised by key handling, signing and script construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid multi-signature threshold: m={m}, n={n}")]
    InvalidThreshold { m: usize, n: usize },

    #[error("Duplicate public key in key set")]
    DuplicateKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
