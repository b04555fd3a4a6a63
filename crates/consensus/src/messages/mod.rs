// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Consensus messages carried in [`onyx_core::ConsensusPayload::data`].
//!
//! Every message is laid out as `u8 tag | u8 view | body`.

mod block_signatures;
mod change_view;
mod prepare_request;
mod prepare_response;

pub use block_signatures::{BlockSignatures, SignatureEntry};
pub use change_view::ChangeView;
pub use prepare_request::PrepareRequest;
pub use prepare_response::PrepareResponse;

use onyx_io::{BinaryWriter, CodecError, CodecResult, MemoryReader, Serializable, SerializableExt};

pub type ViewNumber = u8;
pub type ViewIndex = u16;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ChangeView = 0x00,
    PrepareRequest = 0x20,
    PrepareResponse = 0x21,
    BlockSignatures = 0x40,
}

impl MessageType {
    pub fn from_byte(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::ChangeView),
            0x20 => Some(Self::PrepareRequest),
            0x21 => Some(Self::PrepareResponse),
            0x40 => Some(Self::BlockSignatures),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    ChangeView(ChangeView),
    PrepareRequest(PrepareRequest),
    PrepareResponse(PrepareResponse),
    BlockSignatures(BlockSignatures),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusMessage {
    pub view: ViewNumber,
    pub body: MessageBody,
}

impl ConsensusMessage {
    pub fn new(view: ViewNumber, body: MessageBody) -> Self {
        Self { view, body }
    }

    pub fn message_type(&self) -> MessageType {
        match &self.body {
            MessageBody::ChangeView(_) => MessageType::ChangeView,
            MessageBody::PrepareRequest(_) => MessageType::PrepareRequest,
            MessageBody::PrepareResponse(_) => MessageType::PrepareResponse,
            MessageBody::BlockSignatures(_) => MessageType::BlockSignatures,
        }
    }

    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        self.to_array()
    }

    /// Decodes `data`, rejecting unknown tags and trailing bytes.
    #[inline]
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        Self::from_array(data)
    }
}

impl Serializable for ConsensusMessage {
    fn size(&self) -> usize {
        2 + match &self.body {
            MessageBody::ChangeView(m) => m.size(),
            MessageBody::PrepareRequest(m) => m.size(),
            MessageBody::PrepareResponse(m) => m.size(),
            MessageBody::BlockSignatures(m) => m.size(),
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.message_type() as u8);
        writer.write_u8(self.view);
        match &self.body {
            MessageBody::ChangeView(m) => m.serialize(writer),
            MessageBody::PrepareRequest(m) => m.serialize(writer),
            MessageBody::PrepareResponse(m) => m.serialize(writer),
            MessageBody::BlockSignatures(m) => m.serialize(writer),
        }
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let tag = reader.read_u8()?;
        let kind = MessageType::from_byte(tag).ok_or(CodecError::InvalidTag(tag))?;
        let view = reader.read_u8()?;
        let body = match kind {
            MessageType::ChangeView => MessageBody::ChangeView(ChangeView::deserialize(reader)?),
            MessageType::PrepareRequest => {
                MessageBody::PrepareRequest(PrepareRequest::deserialize(reader)?)
            }
            MessageType::PrepareResponse => {
                MessageBody::PrepareResponse(PrepareResponse::deserialize(reader)?)
            }
            MessageType::BlockSignatures => {
                MessageBody::BlockSignatures(BlockSignatures::deserialize(reader)?)
            }
        };
        Ok(Self { view, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_core::Transaction;
    use onyx_cryptography::Signature;
    use onyx_primitives::UInt160;
    use proptest::prelude::*;

    fn sig(b: u8) -> Signature {
        Signature::new([b; 64])
    }

    fn samples() -> Vec<ConsensusMessage> {
        vec![
            ConsensusMessage::new(0, MessageBody::ChangeView(ChangeView { new_view: 1 })),
            ConsensusMessage::new(
                2,
                MessageBody::PrepareRequest(PrepareRequest {
                    nonce: 0x1111,
                    next_bookkeeper: UInt160::new([3; 20]),
                    transactions: vec![
                        Transaction::bookkeeping(0x1111),
                        Transaction::invoke(vec![1, 2, 3]),
                    ],
                    signature: sig(4),
                }),
            ),
            ConsensusMessage::new(1, MessageBody::PrepareResponse(PrepareResponse { signature: sig(5) })),
            ConsensusMessage::new(
                0,
                MessageBody::BlockSignatures(BlockSignatures {
                    entries: vec![
                        SignatureEntry { index: 0, signature: sig(6) },
                        SignatureEntry { index: 3, signature: sig(7) },
                    ],
                }),
            ),
        ]
    }

    #[test]
    fn tags_and_layout() {
        let tags: Vec<u8> = samples().iter().map(|m| m.encode()[0]).collect();
        assert_eq!(tags, vec![0x00, 0x20, 0x21, 0x40]);

        let encoded = samples()[0].encode();
        assert_eq!(encoded, vec![0x00, 0x00, 0x01]);
        let encoded = samples()[2].encode();
        assert_eq!(encoded.len(), 2 + 64);
        assert_eq!(encoded[1], 1);
    }

    #[test]
    fn decode_restores_every_variant() {
        for message in samples() {
            let encoded = message.encode();
            assert_eq!(encoded.len(), message.size());
            assert_eq!(ConsensusMessage::decode(&encoded).unwrap(), message);
        }
    }

    #[test]
    fn rejects_unknown_tag_and_trailing_bytes() {
        assert_eq!(
            ConsensusMessage::decode(&[0x30, 0x00]),
            Err(CodecError::InvalidTag(0x30))
        );
        let mut encoded = samples()[0].encode();
        encoded.push(0);
        assert!(matches!(
            ConsensusMessage::decode(&encoded),
            Err(CodecError::BadLength(_))
        ));
        assert!(matches!(
            ConsensusMessage::decode(&[0x21, 0x00, 0x01]),
            Err(CodecError::Truncated { .. })
        ));
    }

    proptest! {
        #[test]
        fn fuzzed_bytes_never_decode_with_residue(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            if let Ok(message) = ConsensusMessage::decode(&data) {
                prop_assert_eq!(message.encode(), data);
            }
        }

        #[test]
        fn mutated_messages_never_decode_with_residue(
            which in 0usize..4,
            position in any::<prop::sample::Index>(),
            byte in any::<u8>(),
        ) {
            let mut data = samples()[which].encode();
            let at = position.index(data.len());
            data[at] = byte;
            if let Ok(message) = ConsensusMessage::decode(&data) {
                prop_assert_eq!(message.encode(), data);
            }
        }
    }
}
