// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-height progress flags. The empty set is the initial state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ConsensusState: u8 {
        const PRIMARY = 0x01;
        const BACKUP = 0x02;
        const REQUEST_SENT = 0x04;
        const REQUEST_RECEIVED = 0x08;
        const SIGNATURE_SENT = 0x10;
        const BLOCK_GENERATED = 0x20;
    }
}

impl ConsensusState {
    pub const INITIAL: Self = Self::empty();

    #[inline]
    pub fn is_initial(&self) -> bool {
        self.is_empty()
    }

    /// Human readable listing of every set flag, e.g. `Backup|RequestReceived`.
    pub fn detail(&self) -> String {
        if self.is_initial() {
            return "Initial".into();
        }
        const NAMES: [(ConsensusState, &str); 6] = [
            (ConsensusState::PRIMARY, "Primary"),
            (ConsensusState::BACKUP, "Backup"),
            (ConsensusState::REQUEST_SENT, "RequestSent"),
            (ConsensusState::REQUEST_RECEIVED, "RequestReceived"),
            (ConsensusState::SIGNATURE_SENT, "SignatureSent"),
            (ConsensusState::BLOCK_GENERATED, "BlockGenerated"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::fmt::Display for ConsensusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail())
    }
}
