// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Transaction pool consumed by the block proposer.

use crate::{TxPoolError, TxPoolResult};
use indexmap::IndexMap;
use onyx_core::{
    LedgerBus, LedgerEvent, LedgerEventKind, Subscription, Transaction, TransactionPayload,
};
use onyx_primitives::UInt256;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// What the consensus engine needs from a transaction pool.
pub trait TxPool: Send + Sync {
    /// Up to `max` pooled transactions, oldest first.
    fn pending(&self, max: usize) -> Vec<Transaction>;

    /// Verifies a transaction proposed by another bookkeeper.
    fn verify_transaction(&self, transaction: &Transaction) -> TxPoolResult<()>;
}

/// Pluggable validation applied both on admission and to proposed blocks.
pub trait TxVerifier: Send + Sync {
    fn verify_transaction(&self, transaction: &Transaction) -> TxPoolResult<()>;
}

impl<F> TxVerifier for F
where
    F: Fn(&Transaction) -> TxPoolResult<()> + Send + Sync,
{
    fn verify_transaction(&self, transaction: &Transaction) -> TxPoolResult<()> {
        self(transaction)
    }
}

/// Rejects bookkeeping transactions and empty invocation scripts.
#[derive(Debug, Default)]
pub struct DefaultTxVerifier;

impl TxVerifier for DefaultTxVerifier {
    fn verify_transaction(&self, transaction: &Transaction) -> TxPoolResult<()> {
        match &transaction.payload {
            TransactionPayload::Bookkeeping { .. } => Err(TxPoolError::BookkeepingNotAllowed),
            TransactionPayload::Invoke { code } if code.is_empty() => {
                Err(TxPoolError::Rejected("empty invocation script".into()))
            }
            TransactionPayload::Invoke { .. } => Ok(()),
        }
    }
}

/// Insertion-ordered in-memory pool.
///
/// Subscribes to [`LedgerEvent::BlockPersisted`] and evicts every transaction
/// the committed block contains.
pub struct MemoryPool {
    transactions: Mutex<IndexMap<UInt256, Transaction>>,
    capacity: usize,
    verifier: Arc<dyn TxVerifier>,
    bus: LedgerBus,
    _persisted: Subscription<LedgerEvent>,
}

impl MemoryPool {
    pub fn new(capacity: usize, bus: LedgerBus) -> Arc<Self> {
        Self::with_verifier(capacity, Arc::new(DefaultTxVerifier), bus)
    }

    pub fn with_verifier(
        capacity: usize,
        verifier: Arc<dyn TxVerifier>,
        bus: LedgerBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let persisted = bus.subscribe(LedgerEventKind::BlockPersisted, move |event| {
                if let (Some(pool), LedgerEvent::BlockPersisted(block)) = (weak.upgrade(), event) {
                    let hashes: Vec<UInt256> =
                        block.transactions.iter().map(Transaction::hash).collect();
                    pool.update_for_block_persisted(&hashes);
                }
            });
            Self {
                transactions: Mutex::new(IndexMap::new()),
                capacity,
                verifier,
                bus,
                _persisted: persisted,
            }
        })
    }

    /// Verifies and admits `transaction`, publishing
    /// [`LedgerEvent::TransactionPooled`] on success.
    pub fn try_add(&self, transaction: Transaction) -> TxPoolResult<UInt256> {
        if transaction.is_bookkeeping() {
            return Err(TxPoolError::BookkeepingNotAllowed);
        }
        if let Err(e) = self.verifier.verify_transaction(&transaction) {
            warn!(error = %e, "transaction failed verification");
            return Err(e);
        }

        let hash = transaction.hash();
        {
            let mut transactions = self.transactions.lock();
            if transactions.contains_key(&hash) {
                return Err(TxPoolError::Duplicate(hash));
            }
            if transactions.len() >= self.capacity {
                return Err(TxPoolError::Full {
                    capacity: self.capacity,
                });
            }
            transactions.insert(hash, transaction);
        }

        debug!(%hash, "transaction pooled");
        self.bus.publish(LedgerEvent::TransactionPooled(hash));
        Ok(hash)
    }

    pub fn try_remove(&self, hash: &UInt256) -> Option<Transaction> {
        self.transactions.lock().shift_remove(hash)
    }

    pub fn contains(&self, hash: &UInt256) -> bool {
        self.transactions.lock().contains_key(hash)
    }

    pub fn count(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Drops transactions included in a committed block.
    pub fn update_for_block_persisted(&self, block_transactions: &[UInt256]) {
        let mut transactions = self.transactions.lock();
        let before = transactions.len();
        for hash in block_transactions {
            transactions.shift_remove(hash);
        }
        let removed = before - transactions.len();
        if removed > 0 {
            info!(
                removed,
                remaining = transactions.len(),
                "evicted committed transactions"
            );
        }
    }
}

impl TxPool for MemoryPool {
    fn pending(&self, max: usize) -> Vec<Transaction> {
        self.transactions.lock().values().take(max).cloned().collect()
    }

    fn verify_transaction(&self, transaction: &Transaction) -> TxPoolResult<()> {
        self.verifier.verify_transaction(transaction)
    }
}
