// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Core
//!
//! Ledger data model shared by the chain store, the transaction pool and the
//! consensus engine.
//!
//! - [`Transaction`]: the per-block bookkeeping transaction and opaque
//!   invocations
//! - [`Header`] and [`Block`], hashed over the unsigned header encoding
//! - [`ConsensusPayload`]: the signed envelope consensus messages travel in
//! - [`EventBus`]: typed publish/subscribe with drop-to-unsubscribe handles
//!
//! ## Example
//!
//! ```rust
//! use onyx_core::{Block, Transaction};
//! use onyx_cryptography::KeyPair;
//! use onyx_io::SerializableExt;
//!
//! let committee: Vec<_> = (1..=4u8)
//!     .map(|i| KeyPair::from_private_key(&[i; 32]).unwrap().public_key().clone())
//!     .collect();
//! let genesis = Block::genesis(committee, 1_700_000_000).unwrap();
//! let decoded = Block::from_array(&genesis.to_array()).unwrap();
//! assert_eq!(decoded.hash(), genesis.hash());
//! assert!(genesis.transactions[0].is_bookkeeping());
//! ```

pub mod block;
pub mod committee;
pub mod events;
pub mod header;
pub mod payload;
pub mod time;
pub mod transaction;

pub use block::{Block, MAX_TRANSACTIONS_PER_BLOCK};
pub use committee::{max_faulty, next_bookkeeper_address, quorum};
pub use events::{BusEvent, EventBus, LedgerBus, LedgerEvent, LedgerEventKind, Subscription};
pub use header::Header;
pub use payload::{ConsensusPayload, Program};
pub use transaction::{Transaction, TransactionPayload, TransactionType};

pub use onyx_primitives::{UInt160, UInt256};
