// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Implementation of `UInt160`, a 160-bit unsigned integer.

use crate::error::{PrimitiveError, PrimitiveResult};
use onyx_io::{BinaryWriter, CodecResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The length of `UInt160` values in bytes.
pub const UINT160_SIZE: usize = 20;

/// Represents a 160-bit unsigned integer, stored little-endian.
///
/// Used for addresses: the hash160 of a redeem script.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UInt160([u8; UINT160_SIZE]);

impl UInt160 {
    pub const LENGTH: usize = UINT160_SIZE;

    /// Returns a zero `UInt160`.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; UINT160_SIZE])
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; UINT160_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a new `UInt160` from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::InvalidFormat` if the input length is not exactly 20 bytes.
    pub fn from_bytes(value: &[u8]) -> PrimitiveResult<Self> {
        let bytes: [u8; UINT160_SIZE] =
            value
                .try_into()
                .map_err(|_| PrimitiveError::InvalidFormat {
                    message: format!("Invalid length: {}", value.len()),
                })?;
        Ok(Self(bytes))
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UINT160_SIZE] {
        &self.0
    }

    /// Parses a `UInt160` from its display form (`0x` prefix optional).
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::InvalidFormat` if the input is not a
    /// 40-character hexadecimal string.
    pub fn parse(s: &str) -> PrimitiveResult<Self> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if s.len() != UINT160_SIZE * 2 {
            return Err(PrimitiveError::InvalidFormat {
                message: format!("expected {} hex characters, got {}", UINT160_SIZE * 2, s.len()),
            });
        }
        let mut bytes = hex::decode(s).map_err(|e| PrimitiveError::InvalidFormat {
            message: e.to_string(),
        })?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Converts the `UInt160` to its display form.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        format!("0x{}", hex::encode(bytes))
    }
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt160({})", self.to_hex_string())
    }
}

impl FromStr for UInt160 {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; UINT160_SIZE]> for UInt160 {
    fn from(bytes: [u8; UINT160_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for UInt160 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serializable for UInt160 {
    fn size(&self) -> usize {
        UINT160_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&self.0);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self(reader.read_array()?))
    }
}
