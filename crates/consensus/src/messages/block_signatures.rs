// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_cryptography::{Signature, MAX_MULTISIG_KEYS, SIGNATURE_SIZE};
use onyx_io::{helper, BinaryWriter, CodecResult, MemoryReader, Serializable};

use super::ViewIndex;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub index: ViewIndex,
    pub signature: Signature,
}

/// Signatures gathered for a generated block, sent so that nodes which
/// missed the prepare exchange can still finalise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSignatures {
    pub entries: Vec<SignatureEntry>,
}

impl Serializable for BlockSignatures {
    fn size(&self) -> usize {
        helper::get_var_size(self.entries.len() as u64) + self.entries.len() * (2 + SIGNATURE_SIZE)
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_var_int(self.entries.len() as u64);
        for entry in &self.entries {
            writer.write_u16(entry.index);
            writer.write_bytes(entry.signature.as_bytes());
        }
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let count = reader.read_var_int(MAX_MULTISIG_KEYS as u64)? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(SignatureEntry {
                index: reader.read_u16()?,
                signature: Signature::new(reader.read_array()?),
            });
        }
        Ok(Self { entries })
    }
}
