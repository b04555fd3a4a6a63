// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Transactions carried in blocks.
//!
//! Only two kinds exist: the bookkeeping transaction that every block starts
//! with, and opaque invocation transactions whose execution is outside the
//! consensus engine.

use onyx_cryptography::hash256;
use onyx_io::{BinaryWriter, CodecError, CodecResult, MemoryReader, Serializable, SerializableExt};
use onyx_primitives::{UInt160, UInt256, UINT160_SIZE};
use std::fmt;

/// Current transaction format version.
pub const TRANSACTION_VERSION: u8 = 0;

/// Largest accepted invocation script.
pub const MAX_INVOKE_CODE_SIZE: usize = 65_536;

/// Wire discriminant of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionType {
    Bookkeeping = 0x00,
    Invoke = 0xd1,
}

impl TransactionType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Bookkeeping),
            0xd1 => Some(Self::Invoke),
            _ => None,
        }
    }
}

/// Type-specific transaction body.
#[derive(Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    /// Commits the block nonce and an optional fee recipient. Performs no
    /// state transition of its own.
    Bookkeeping {
        nonce: u64,
        fee_recipient: Option<UInt160>,
    },
    /// Opaque script for the execution layer.
    Invoke { code: Vec<u8> },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub payload: TransactionPayload,
}

impl Transaction {
    /// The bookkeeping transaction for a block proposed with `nonce`.
    pub fn bookkeeping(nonce: u64) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            payload: TransactionPayload::Bookkeeping {
                nonce,
                fee_recipient: None,
            },
        }
    }

    pub fn bookkeeping_with_recipient(nonce: u64, recipient: UInt160) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            payload: TransactionPayload::Bookkeeping {
                nonce,
                fee_recipient: Some(recipient),
            },
        }
    }

    pub fn invoke(code: Vec<u8>) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            payload: TransactionPayload::Invoke { code },
        }
    }

    pub fn tx_type(&self) -> TransactionType {
        match self.payload {
            TransactionPayload::Bookkeeping { .. } => TransactionType::Bookkeeping,
            TransactionPayload::Invoke { .. } => TransactionType::Invoke,
        }
    }

    pub fn is_bookkeeping(&self) -> bool {
        self.tx_type() == TransactionType::Bookkeeping
    }

    /// Nonce committed by a bookkeeping transaction.
    pub fn bookkeeping_nonce(&self) -> Option<u64> {
        match self.payload {
            TransactionPayload::Bookkeeping { nonce, .. } => Some(nonce),
            TransactionPayload::Invoke { .. } => None,
        }
    }

    /// `hash256` of the full encoding.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.to_array())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("type", &self.tx_type())
            .field("hash", &self.hash())
            .finish()
    }
}

impl Serializable for Transaction {
    fn size(&self) -> usize {
        2 + match &self.payload {
            TransactionPayload::Bookkeeping { fee_recipient, .. } => {
                8 + 1 + fee_recipient.map_or(0, |_| UINT160_SIZE)
            }
            TransactionPayload::Invoke { code } => onyx_io::helper::get_var_bytes_size(code),
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.version);
        writer.write_u8(self.tx_type() as u8);
        match &self.payload {
            TransactionPayload::Bookkeeping {
                nonce,
                fee_recipient,
            } => {
                writer.write_u64(*nonce);
                writer.write_bool(fee_recipient.is_some());
                if let Some(recipient) = fee_recipient {
                    recipient.serialize(writer);
                }
            }
            TransactionPayload::Invoke { code } => writer.write_var_bytes(code),
        }
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let version = reader.read_u8()?;
        let tag = reader.read_u8()?;
        let payload = match TransactionType::from_byte(tag).ok_or(CodecError::InvalidTag(tag))? {
            TransactionType::Bookkeeping => {
                let nonce = reader.read_u64()?;
                let fee_recipient = if reader.read_bool()? {
                    Some(UInt160::deserialize(reader)?)
                } else {
                    None
                };
                TransactionPayload::Bookkeeping {
                    nonce,
                    fee_recipient,
                }
            }
            TransactionType::Invoke => TransactionPayload::Invoke {
                code: reader.read_var_bytes(MAX_INVOKE_CODE_SIZE)?,
            },
        };
        Ok(Self { version, payload })
    }
}
