// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_cryptography::{hash256, PublicKey, Signature, MAX_MULTISIG_KEYS, SIGNATURE_SIZE};
use onyx_io::{helper, BinaryWriter, CodecError, CodecResult, MemoryReader, Serializable};
use onyx_primitives::{UInt160, UInt256, UINT160_SIZE, UINT256_SIZE};

/// Largest opaque `consensus_payload` a header may carry.
pub const MAX_CONSENSUS_PAYLOAD_SIZE: usize = 1024;

/// Block header.
///
/// Signatures commit to the unsigned part only, everything except
/// `bookkeepers` and `sig_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub prev_hash: UInt256,
    pub tx_root: UInt256,
    pub block_root: UInt256,
    pub timestamp: u32,
    pub height: u32,
    /// The proposer's nonce.
    pub consensus_data: u64,
    pub consensus_payload: Vec<u8>,
    pub next_bookkeeper: UInt160,
    pub bookkeepers: Vec<PublicKey>,
    pub sig_data: Vec<Signature>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: 0,
            prev_hash: UInt256::zero(),
            tx_root: UInt256::zero(),
            block_root: UInt256::zero(),
            timestamp: 0,
            height: 0,
            consensus_data: 0,
            consensus_payload: Vec::new(),
            next_bookkeeper: UInt160::zero(),
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
        }
    }
}

impl Header {
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.version);
        self.prev_hash.serialize(writer);
        self.tx_root.serialize(writer);
        self.block_root.serialize(writer);
        writer.write_u32(self.timestamp);
        writer.write_u32(self.height);
        writer.write_u64(self.consensus_data);
        writer.write_var_bytes(&self.consensus_payload);
        self.next_bookkeeper.serialize(writer);
    }

    fn unsigned_size(&self) -> usize {
        4 + UINT256_SIZE * 3
            + 4
            + 4
            + 8
            + helper::get_var_bytes_size(&self.consensus_payload)
            + UINT160_SIZE
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.unsigned_size());
        self.serialize_unsigned(&mut writer);
        writer.into_bytes()
    }

    /// `sha256(sha256(unsigned encoding))`.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.unsigned_bytes())
    }

    fn deserialize_unsigned(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self {
            version: reader.read_u32()?,
            prev_hash: UInt256::deserialize(reader)?,
            tx_root: UInt256::deserialize(reader)?,
            block_root: UInt256::deserialize(reader)?,
            timestamp: reader.read_u32()?,
            height: reader.read_u32()?,
            consensus_data: reader.read_u64()?,
            consensus_payload: reader.read_var_bytes(MAX_CONSENSUS_PAYLOAD_SIZE)?,
            next_bookkeeper: UInt160::deserialize(reader)?,
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
        })
    }
}

impl Serializable for Header {
    fn size(&self) -> usize {
        self.unsigned_size()
            + helper::get_array_size(&self.bookkeepers)
            + helper::get_var_size(self.sig_data.len() as u64)
            + self.sig_data.len() * (1 + SIGNATURE_SIZE)
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        self.serialize_unsigned(writer);
        helper::serialize_array(&self.bookkeepers, writer);
        writer.write_var_int(self.sig_data.len() as u64);
        for sig in &self.sig_data {
            writer.write_var_bytes(sig.as_bytes());
        }
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let mut header = Self::deserialize_unsigned(reader)?;
        header.bookkeepers = helper::deserialize_array(reader, MAX_MULTISIG_KEYS)?;
        let count = reader.read_var_int(MAX_MULTISIG_KEYS as u64)? as usize;
        let mut sig_data = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes = reader.read_var_memory(SIGNATURE_SIZE)?;
            let sig = Signature::from_slice(bytes)
                .map_err(|e| CodecError::bad_length(e.to_string()))?;
            sig_data.push(sig);
        }
        header.sig_data = sig_data;
        Ok(header)
    }
}
