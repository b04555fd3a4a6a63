// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! In-memory chain store.

use crate::{AddBlockOutcome, ChainStore, LedgerError, LedgerResult};
use onyx_core::committee::canonical_order;
use onyx_core::{
    next_bookkeeper_address, quorum, Block, Header, LedgerBus, LedgerEvent, Transaction,
};
use onyx_cryptography::{merkle, verify_multi, PublicKey};
use onyx_primitives::UInt256;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct ChainData {
    blocks: Vec<Arc<Block>>,
    heights: HashMap<UInt256, u32>,
    tx_roots: Vec<UInt256>,
    committed_txs: HashSet<UInt256>,
}

/// Chain store that keeps every block in memory and publishes
/// [`LedgerEvent::BlockPersisted`] on the bus after each commit.
pub struct MemoryChainStore {
    data: RwLock<ChainData>,
    committee: Vec<PublicKey>,
    bus: LedgerBus,
    /// Serialises commit + publish so events leave in height order.
    commit_lock: Mutex<()>,
}

impl MemoryChainStore {
    /// Creates a store rooted at `genesis`, whose bookkeepers govern every
    /// later height.
    pub fn new(genesis: Block, bus: LedgerBus) -> LedgerResult<Self> {
        if genesis.height() != 0 {
            return Err(LedgerError::InvalidHeight {
                expected: 0,
                actual: genesis.height(),
            });
        }
        let committee = canonical_order(genesis.header.bookkeepers.clone());
        if committee.len() != genesis.header.bookkeepers.len() {
            return Err(LedgerError::InvalidBlock(
                "genesis committee has duplicate keys".into(),
            ));
        }
        let expected = next_bookkeeper_address(&committee)
            .map_err(|e| LedgerError::InvalidBlock(e.to_string()))?;
        if genesis.header.next_bookkeeper != expected {
            return Err(LedgerError::InvalidBlock(
                "genesis next_bookkeeper does not match its committee".into(),
            ));
        }

        let mut data = ChainData::default();
        data.insert(Arc::new(genesis));
        info!(
            bookkeepers = committee.len(),
            "chain store initialised from genesis"
        );
        Ok(Self {
            data: RwLock::new(data),
            committee,
            bus,
            commit_lock: Mutex::new(()),
        })
    }

    pub fn bus(&self) -> &LedgerBus {
        &self.bus
    }

    fn validate(&self, data: &ChainData, block: &Block) -> LedgerResult<()> {
        let header = &block.header;
        let expected_height = data.blocks.len() as u32;
        if header.height != expected_height {
            return Err(LedgerError::InvalidHeight {
                expected: expected_height,
                actual: header.height,
            });
        }
        let tip = data.tip();
        if header.prev_hash != tip.hash() {
            return Err(LedgerError::InvalidPrevHash {
                expected: tip.hash(),
                actual: header.prev_hash,
            });
        }
        if header.timestamp <= tip.header.timestamp {
            return Err(LedgerError::InvalidBlock(format!(
                "timestamp {} not after parent {}",
                header.timestamp, tip.header.timestamp
            )));
        }

        match block.transactions.split_first() {
            Some((first, rest)) if first.is_bookkeeping() => {
                if rest.iter().any(Transaction::is_bookkeeping) {
                    return Err(LedgerError::InvalidBlock(
                        "more than one bookkeeping transaction".into(),
                    ));
                }
            }
            _ => {
                return Err(LedgerError::InvalidBlock(
                    "first transaction must be bookkeeping".into(),
                ))
            }
        }
        if header.tx_root != Block::compute_tx_root(&block.transactions) {
            return Err(LedgerError::InvalidBlock("transaction root mismatch".into()));
        }
        if header.block_root != data.block_root_with(&header.tx_root) {
            return Err(LedgerError::InvalidBlock("block root mismatch".into()));
        }

        if header.bookkeepers != self.committee {
            return Err(LedgerError::InvalidBlock(
                "bookkeepers differ from the committee".into(),
            ));
        }
        let next = next_bookkeeper_address(&self.committee)
            .map_err(|e| LedgerError::InvalidBlock(e.to_string()))?;
        if header.next_bookkeeper != next {
            return Err(LedgerError::InvalidBlock("next_bookkeeper mismatch".into()));
        }
        let m = quorum(self.committee.len());
        if !verify_multi(block.hash().as_bytes(), &self.committee, m, &header.sig_data) {
            return Err(LedgerError::InvalidBlock(format!(
                "signatures do not reach {m} of {}",
                self.committee.len()
            )));
        }
        Ok(())
    }
}

impl ChainData {
    fn tip(&self) -> &Block {
        // Constructed with genesis, never empty.
        &self.blocks[self.blocks.len() - 1]
    }

    fn insert(&mut self, block: Arc<Block>) {
        self.heights.insert(block.hash(), block.height());
        self.tx_roots.push(block.header.tx_root);
        self.committed_txs
            .extend(block.transactions.iter().map(Transaction::hash));
        self.blocks.push(block);
    }

    fn block_root_with(&self, tx_root: &UInt256) -> UInt256 {
        let mut roots = self.tx_roots.clone();
        roots.push(*tx_root);
        merkle::compute_root(&roots)
    }
}

impl ChainStore for MemoryChainStore {
    fn current_height(&self) -> u32 {
        self.data.read().tip().height()
    }

    fn current_hash(&self) -> UInt256 {
        self.data.read().tip().hash()
    }

    fn header_at(&self, height: u32) -> Option<Header> {
        self.block_at(height).map(|block| block.header.clone())
    }

    fn block_at(&self, height: u32) -> Option<Arc<Block>> {
        self.data.read().blocks.get(height as usize).cloned()
    }

    fn bookkeepers_for_next(&self) -> Vec<PublicKey> {
        self.committee.clone()
    }

    fn add_block(&self, block: &Block) -> LedgerResult<AddBlockOutcome> {
        let _commit = self.commit_lock.lock();
        let hash = block.hash();
        let persisted = {
            let mut data = self.data.write();
            if data.heights.contains_key(&hash) {
                debug!(height = block.height(), %hash, "block already committed");
                return Ok(AddBlockOutcome::AlreadyExists);
            }
            self.validate(&data, block)?;
            let persisted = Arc::new(block.clone());
            data.insert(Arc::clone(&persisted));
            persisted
        };

        info!(
            height = persisted.height(),
            %hash,
            txs = persisted.transactions.len(),
            "block committed"
        );
        self.bus.publish(LedgerEvent::BlockPersisted(persisted));
        Ok(AddBlockOutcome::Added)
    }

    fn contains_block(&self, hash: &UInt256) -> bool {
        self.data.read().heights.contains_key(hash)
    }

    fn verify_tx(&self, transaction: &Transaction) -> LedgerResult<()> {
        if transaction.is_bookkeeping() {
            return Err(LedgerError::InvalidTransaction(
                "bookkeeping transactions are only valid at the head of a block".into(),
            ));
        }
        let hash = transaction.hash();
        if self.data.read().committed_txs.contains(&hash) {
            return Err(LedgerError::InvalidTransaction(format!(
                "{hash} already committed"
            )));
        }
        Ok(())
    }

    fn block_root_with(&self, tx_root: &UInt256) -> UInt256 {
        self.data.read().block_root_with(tx_root)
    }
}
