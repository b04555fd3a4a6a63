// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Primitive error types.

use thiserror::Error;

/// Errors raised when constructing or parsing primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Input had the wrong length or was not valid hex.
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

/// Result type for primitive operations.
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;
