// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! The signed envelope in which consensus messages travel between
//! bookkeepers.

use onyx_cryptography::script::{opcode, signature_redeem_script};
use onyx_cryptography::{
    hash256, verify, CryptoResult, KeyPair, PublicKey, Signature, SIGNATURE_SIZE,
};
use onyx_io::{helper, BinaryWriter, CodecResult, MemoryReader, Serializable};
use onyx_primitives::{UInt256, UINT256_SIZE};

/// Largest accepted message body.
pub const MAX_PAYLOAD_DATA_SIZE: usize = 2 * 1024 * 1024;
pub const MAX_PROGRAM_SIZE: usize = 1024;
pub const MAX_PROGRAMS: usize = 16;

/// A witness: an invocation `parameter` and the verification `code` it
/// satisfies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub parameter: Vec<u8>,
    pub code: Vec<u8>,
}

impl Program {
    /// Single-signature witness: `PUSHBYTES64 <sig>` against the key's
    /// signature redeem script.
    pub fn signature(public_key: &PublicKey, signature: &Signature) -> Self {
        let mut parameter = Vec::with_capacity(SIGNATURE_SIZE + 1);
        parameter.push(opcode::PUSHBYTES64);
        parameter.extend_from_slice(signature.as_bytes());
        Self {
            parameter,
            code: signature_redeem_script(public_key),
        }
    }

    /// Signature carried by a single-signature witness.
    pub fn single_signature(&self) -> Option<Signature> {
        match self.parameter.split_first() {
            Some((&opcode::PUSHBYTES64, sig)) => Signature::from_slice(sig).ok(),
            _ => None,
        }
    }
}

impl Serializable for Program {
    fn size(&self) -> usize {
        helper::get_var_bytes_size(&self.parameter) + helper::get_var_bytes_size(&self.code)
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(&self.parameter);
        writer.write_var_bytes(&self.code);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self {
            parameter: reader.read_var_bytes(MAX_PROGRAM_SIZE)?,
            code: reader.read_var_bytes(MAX_PROGRAM_SIZE)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusPayload {
    pub version: u32,
    pub prev_hash: UInt256,
    pub height: u32,
    pub bookkeeper_index: u16,
    pub timestamp: u32,
    /// Encoded consensus message.
    pub data: Vec<u8>,
    pub owner: PublicKey,
    pub programs: Vec<Program>,
}

impl ConsensusPayload {
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.version);
        self.prev_hash.serialize(writer);
        writer.write_u32(self.height);
        writer.write_u16(self.bookkeeper_index);
        writer.write_u32(self.timestamp);
        writer.write_var_bytes(&self.data);
        self.owner.serialize(writer);
    }

    fn unsigned_size(&self) -> usize {
        4 + UINT256_SIZE + 4 + 2 + 4 + helper::get_var_bytes_size(&self.data) + self.owner.size()
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.unsigned_size());
        self.serialize_unsigned(&mut writer);
        writer.into_bytes()
    }

    /// Hash signed by the owner's witness.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.unsigned_bytes())
    }

    /// Replaces the witnesses with a single signature by `key`.
    pub fn sign(&mut self, key: &KeyPair) -> CryptoResult<()> {
        let signature = key.sign(self.hash().as_bytes())?;
        self.programs = vec![Program::signature(key.public_key(), &signature)];
        Ok(())
    }

    /// Checks that the payload carries exactly one witness, that it is the
    /// owner's signature script, and that the signature is valid.
    pub fn verify(&self) -> bool {
        let [program] = self.programs.as_slice() else {
            return false;
        };
        if program.code != signature_redeem_script(&self.owner) {
            return false;
        }
        match program.single_signature() {
            Some(signature) => verify(&self.owner, self.hash().as_bytes(), &signature),
            None => false,
        }
    }
}

impl Serializable for ConsensusPayload {
    fn size(&self) -> usize {
        self.unsigned_size() + helper::get_array_size(&self.programs)
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        self.serialize_unsigned(writer);
        helper::serialize_array(&self.programs, writer);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self {
            version: reader.read_u32()?,
            prev_hash: UInt256::deserialize(reader)?,
            height: reader.read_u32()?,
            bookkeeper_index: reader.read_u16()?,
            timestamp: reader.read_u32()?,
            data: reader.read_var_bytes(MAX_PAYLOAD_DATA_SIZE)?,
            owner: PublicKey::deserialize(reader)?,
            programs: helper::deserialize_array(reader, MAX_PROGRAMS)?,
        })
    }
}
