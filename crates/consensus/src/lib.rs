// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Consensus
//!
//! Delegated Byzantine Fault Tolerance (dBFT) for a fixed bookkeeper
//! committee of `N` nodes, tolerating `f = (N - 1) / 3` faulty ones and
//! committing with `M = N - f` signatures.
//!
//! ## Core Types
//!
//! - [`DbftService`]: the single-task state machine, driven through a
//!   [`ServiceHandle`]
//! - [`ConsensusContext`]: per-height state owned by the service
//! - [`ConsensusMessage`]: the four consensus messages and their encoding
//! - [`ViewTimer`]: one-shot timer tagged with the `(height, view)` it was
//!   armed for
//!
//! ## Consensus Flow
//!
//! ```text
//!   Primary                     Backups
//!     │                           │
//!     │──── PrepareRequest ──────>│   full block body, primary signature
//!     │                           │
//!     │<─── PrepareResponse ──────│   backup signature over the header
//!     │                           │
//!     │<─── BlockSignatures ─────>│   once M signatures are known
//!     ▼                           ▼
//!            block committed
//! ```
//!
//! A backup whose timer runs out asks for view `v + 1` with a ChangeView;
//! `M` matching requests move every node to the new view and primary.
//!
//! ## Example
//!
//! ```rust
//! use onyx_consensus::{ChangeView, ConsensusMessage, MessageBody, MessageType};
//!
//! let message = ConsensusMessage::new(0, MessageBody::ChangeView(ChangeView { new_view: 1 }));
//! let encoded = message.encode();
//! assert_eq!(encoded, vec![0x00, 0x00, 0x01]);
//! assert_eq!(MessageType::from_byte(encoded[0]), Some(MessageType::ChangeView));
//! assert_eq!(ConsensusMessage::decode(&encoded).unwrap(), message);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod messages;
pub mod service;
pub mod state;
pub mod timer;

pub use config::{parse_bookkeepers, DbftConfig};
pub use context::{primary_index, Committee, ConsensusContext, ContextSnapshot};
pub use error::{ConsensusError, ConsensusResult, DropReason};
pub use messages::{
    BlockSignatures, ChangeView, ConsensusMessage, MessageBody, MessageType, PrepareRequest,
    PrepareResponse, SignatureEntry, ViewIndex, ViewNumber,
};
pub use service::{Clock, DbftService, Event, NonceSource, ServiceHandle};
pub use state::ConsensusState;
pub use timer::{delay_on_primary, delay_on_view, HView, Timer, ViewTimer};
