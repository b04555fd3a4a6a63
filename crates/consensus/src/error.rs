// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use onyx_io::CodecError;
use thiserror::Error;

/// Why an incoming payload was discarded without touching the context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("not started")]
    NotStarted,

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("bad payload witness")]
    BadWitness,

    #[error("version {actual}, expected {expected}")]
    Version { expected: u32, actual: u32 },

    #[error("height {actual}, expected {expected}")]
    Height { expected: u32, actual: u32 },

    #[error("prev_hash mismatch")]
    PrevHash,

    #[error("bookkeeper index {index} out of range for {count} bookkeepers")]
    IndexOutOfRange { index: u16, count: usize },

    #[error("owner is not bookkeeper {0}")]
    Owner(u16),

    #[error("own payload")]
    OwnPayload,

    #[error("view {actual}, expected {expected}")]
    View { expected: u8, actual: u8 },

    #[error("unexpected in state {0}")]
    State(String),

    #[error("sender {sender} is not primary {primary}")]
    NotPrimary { sender: u16, primary: u16 },

    #[error("timestamp {timestamp} outside ({prev}, now + drift]")]
    Timestamp { prev: u32, timestamp: u32 },

    #[error("next_bookkeeper differs from the committee address")]
    NextBookkeeper,

    #[error("invalid signature from bookkeeper {0}")]
    Signature(u16),

    #[error("duplicate signature from bookkeeper {0}")]
    Duplicate(u16),

    #[error("stale change view {new_view} <= {expected}")]
    StaleChangeView { new_view: u8, expected: u8 },

    #[error("block already generated")]
    BlockGenerated,
}

/// Consensus errors, by how the service reacts to them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// Validation failed; the payload is ignored.
    #[error("Message dropped: {0}")]
    MsgDrop(DropReason),

    /// A proposal carried an invalid transaction; a view change was
    /// requested in response.
    #[error("View change triggered: {0}")]
    ViewChangeTrigger(String),

    /// The ledger refused a commit; signatures and timers will retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The node cannot take part in consensus; the service halts.
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service channel closed")]
    ChannelClosed,
}

impl ConsensusError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsensusError::Fatal(_))
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, ConsensusError::MsgDrop(_))
    }
}

impl From<DropReason> for ConsensusError {
    fn from(reason: DropReason) -> Self {
        ConsensusError::MsgDrop(reason)
    }
}

impl From<CodecError> for ConsensusError {
    fn from(err: CodecError) -> Self {
        ConsensusError::MsgDrop(DropReason::Malformed(err.to_string()))
    }
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_are_drops() {
        let err: ConsensusError = CodecError::InvalidTag(0x99).into();
        assert!(err.is_drop());
        assert!(!err.is_fatal());
        assert!(matches!(err, ConsensusError::MsgDrop(DropReason::Malformed(_))));
    }

    #[test]
    fn display() {
        let err = ConsensusError::from(DropReason::NotPrimary { sender: 2, primary: 1 });
        assert_eq!(err.to_string(), "Message dropped: sender 2 is not primary 1");
        assert!(ConsensusError::Fatal("no key".into()).is_fatal());
    }
}
