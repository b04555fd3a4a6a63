// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_core::{Transaction, MAX_TRANSACTIONS_PER_BLOCK};
use onyx_cryptography::{Signature, SIGNATURE_SIZE};
use onyx_io::{helper, BinaryWriter, CodecError, CodecResult, MemoryReader, Serializable};
use onyx_primitives::{UInt160, UINT160_SIZE};

/// The primary's proposal for the current (height, view).
///
/// `transactions` is the full ordered block body. The first entry is the
/// bookkeeping transaction committing `nonce`; no other bookkeeping
/// transaction may follow. `signature` is the primary's signature over the
/// resulting header hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRequest {
    pub nonce: u64,
    pub next_bookkeeper: UInt160,
    pub transactions: Vec<Transaction>,
    pub signature: Signature,
}

impl PrepareRequest {
    /// Checks the bookkeeping transaction rule.
    pub fn check_transactions(nonce: u64, transactions: &[Transaction]) -> CodecResult<()> {
        let Some((first, rest)) = transactions.split_first() else {
            return Err(CodecError::invalid_data("proposal without bookkeeping transaction"));
        };
        if first.bookkeeping_nonce() != Some(nonce) {
            return Err(CodecError::invalid_data(
                "first transaction is not the bookkeeping transaction for the nonce",
            ));
        }
        if rest.iter().any(Transaction::is_bookkeeping) {
            return Err(CodecError::invalid_data("more than one bookkeeping transaction"));
        }
        Ok(())
    }
}

impl Serializable for PrepareRequest {
    fn size(&self) -> usize {
        8 + UINT160_SIZE + helper::get_array_size(&self.transactions) + SIGNATURE_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.nonce);
        self.next_bookkeeper.serialize(writer);
        helper::serialize_array(&self.transactions, writer);
        writer.write_bytes(self.signature.as_bytes());
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let nonce = reader.read_u64()?;
        let next_bookkeeper = UInt160::deserialize(reader)?;
        let transactions = helper::deserialize_array(reader, MAX_TRANSACTIONS_PER_BLOCK)?;
        Self::check_transactions(nonce, &transactions)?;
        Ok(Self {
            nonce,
            next_bookkeeper,
            transactions,
            signature: Signature::new(reader.read_array()?),
        })
    }
}
