// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_io::{BinaryWriter, CodecResult, MemoryReader, Serializable};

use super::ViewNumber;

/// A bookkeeper's request to move the current height to `new_view`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChangeView {
    pub new_view: ViewNumber,
}

impl Serializable for ChangeView {
    fn size(&self) -> usize {
        1
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.new_view);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self {
            new_view: reader.read_u8()?,
        })
    }
}
