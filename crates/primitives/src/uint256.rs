// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Implementation of `UInt256`, a 256-bit unsigned integer.

use crate::error::{PrimitiveError, PrimitiveResult};
use onyx_io::{BinaryWriter, CodecResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The length of `UInt256` values in bytes.
pub const UINT256_SIZE: usize = 32;

/// Represents a 256-bit unsigned integer, stored little-endian.
///
/// Used for transaction hashes, block hashes and Merkle roots.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UInt256([u8; UINT256_SIZE]);

impl UInt256 {
    pub const LENGTH: usize = UINT256_SIZE;

    /// Returns a zero `UInt256`.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; UINT256_SIZE])
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; UINT256_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a new `UInt256` from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::InvalidFormat` if the input length is not exactly 32 bytes.
    pub fn from_bytes(value: &[u8]) -> PrimitiveResult<Self> {
        let bytes: [u8; UINT256_SIZE] =
            value
                .try_into()
                .map_err(|_| PrimitiveError::InvalidFormat {
                    message: format!("Invalid length: {}", value.len()),
                })?;
        Ok(Self(bytes))
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UINT256_SIZE] {
        &self.0
    }

    /// Parses a `UInt256` from its display form (`0x` prefix optional).
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::InvalidFormat` if the input is not a
    /// 64-character hexadecimal string.
    pub fn parse(s: &str) -> PrimitiveResult<Self> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if s.len() != UINT256_SIZE * 2 {
            return Err(PrimitiveError::InvalidFormat {
                message: format!("expected {} hex characters, got {}", UINT256_SIZE * 2, s.len()),
            });
        }
        let mut bytes = hex::decode(s).map_err(|e| PrimitiveError::InvalidFormat {
            message: e.to_string(),
        })?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Converts the `UInt256` to its display form.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        format!("0x{}", hex::encode(bytes))
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({})", self.to_hex_string())
    }
}

impl FromStr for UInt256 {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; UINT256_SIZE]> for UInt256 {
    fn from(bytes: [u8; UINT256_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for UInt256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serializable for UInt256 {
    fn size(&self) -> usize {
        UINT256_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&self.0);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self(reader.read_array()?))
    }
}
