// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use crate::committee::{canonical_order, next_bookkeeper_address};
use crate::{Header, Transaction};
use onyx_cryptography::{merkle, CryptoResult, PublicKey};
use onyx_io::{helper, BinaryWriter, CodecResult, MemoryReader, Serializable};
use onyx_primitives::UInt256;

/// Upper bound on transactions decoded from a single block or proposal.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> UInt256 {
        self.header.hash()
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Merkle root over the transaction hashes, in block order.
    pub fn compute_tx_root(transactions: &[Transaction]) -> UInt256 {
        let hashes: Vec<UInt256> = transactions.iter().map(Transaction::hash).collect();
        merkle::compute_root(&hashes)
    }

    /// The height-0 block of a chain governed by `bookkeepers`.
    ///
    /// It carries the committee in canonical order and no signatures.
    pub fn genesis(bookkeepers: Vec<PublicKey>, timestamp: u32) -> CryptoResult<Self> {
        let bookkeepers = canonical_order(bookkeepers);
        let transactions = vec![Transaction::bookkeeping(0)];
        let header = Header {
            tx_root: Self::compute_tx_root(&transactions),
            timestamp,
            next_bookkeeper: next_bookkeeper_address(&bookkeepers)?,
            bookkeepers,
            ..Header::default()
        };
        Ok(Self::new(header, transactions))
    }
}

impl Serializable for Block {
    fn size(&self) -> usize {
        self.header.size() + helper::get_array_size(&self.transactions)
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        self.header.serialize(writer);
        helper::serialize_array(&self.transactions, writer);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let header = Header::deserialize(reader)?;
        let transactions = helper::deserialize_array(reader, MAX_TRANSACTIONS_PER_BLOCK)?;
        Ok(Self::new(header, transactions))
    }
}
