// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Codec error types.

use thiserror::Error;

/// Errors produced while decoding wire data.
///
/// Encoding into a [`crate::BinaryWriter`] never fails; every variant here
/// describes a way an input byte sequence can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A length or count exceeded its permitted maximum.
    #[error("Value {value} exceeds maximum {max}")]
    Overflow { value: u64, max: u64 },

    /// A discriminant byte did not name a known variant.
    #[error("Invalid tag: 0x{0:02x}")]
    InvalidTag(u8),

    /// A fixed-size field had the wrong length, or bytes were left over.
    #[error("Bad length: {0}")]
    BadLength(String),

    /// The bytes were well formed but do not describe a valid value.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl CodecError {
    /// Creates a bad length error.
    pub fn bad_length<S: Into<String>>(message: S) -> Self {
        Self::BadLength(message.into())
    }

    /// Creates an invalid data error.
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData(message.into())
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
