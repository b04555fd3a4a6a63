// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_cryptography::{Signature, SIGNATURE_SIZE};
use onyx_io::{BinaryWriter, CodecResult, MemoryReader, Serializable};

/// A backup's signature over the proposed header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    pub signature: Signature,
}

impl Serializable for PrepareResponse {
    fn size(&self) -> usize {
        SIGNATURE_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(self.signature.as_bytes());
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self {
            signature: Signature::new(reader.read_array()?),
        })
    }
}
