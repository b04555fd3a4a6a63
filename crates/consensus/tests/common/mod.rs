//! Shared harnesses for the consensus integration tests.
//!
//! [`Devnet`] wires several services through a [`LocalHub`]; [`Solo`] runs
//! one service against hand-crafted payloads from the other bookkeepers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use onyx_consensus::{
    ConsensusContext, ConsensusMessage, DbftConfig, DbftService, ServiceHandle,
};
use onyx_core::{Block, ConsensusPayload, Header, LedgerBus, Transaction};
use onyx_cryptography::{KeyPair, PublicKey};
use onyx_ledger::{
    AddBlockOutcome, ChainStore, DefaultTxVerifier, LedgerError, LedgerResult, MemoryChainStore,
    MemoryPool, TxVerifier,
};
use onyx_network::{HubPort, LocalHub, Outbox};
use onyx_primitives::UInt256;

pub const GENESIS_TIMESTAMP: u32 = 1_000;

/// Frozen wall clock; proposals end up stamped `prev + 1`.
pub fn clock() -> u32 {
    GENESIS_TIMESTAMP
}

/// Committee key pairs in canonical order, so node `i` is bookkeeper `i`.
pub fn committee(n: u8) -> Vec<KeyPair> {
    let mut keys: Vec<KeyPair> = (1..=n)
        .map(|i| KeyPair::from_private_key(&[i; 32]).unwrap())
        .collect();
    keys.sort_by(|a, b| a.public_key().cmp(b.public_key()));
    keys
}

pub fn genesis(keys: &[KeyPair]) -> Block {
    let publics = keys.iter().map(|k| k.public_key().clone()).collect();
    Block::genesis(publics, GENESIS_TIMESTAMP).unwrap()
}

pub fn store(genesis: &Block) -> Arc<MemoryChainStore> {
    Arc::new(MemoryChainStore::new(genesis.clone(), LedgerBus::new()).unwrap())
}

/// Lets every task run to quiescence under paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn decode(payload: &ConsensusPayload) -> ConsensusMessage {
    ConsensusMessage::decode(&payload.data).unwrap()
}

/// Default nonce: distinct per node and per proposal.
pub fn node_nonce(index: usize, round: u64) -> u64 {
    0x1000 * (index as u64 + 1) + round
}

pub fn default_verifier(_: usize) -> Arc<dyn TxVerifier> {
    Arc::new(DefaultTxVerifier)
}

pub struct TestNode {
    pub keypair: KeyPair,
    pub chain: Arc<MemoryChainStore>,
    pub pool: Arc<MemoryPool>,
    pub port: HubPort,
    pub handle: ServiceHandle,
}

pub struct DevnetBuilder {
    size: u8,
    nonce: fn(usize, u64) -> u64,
    verifier: fn(usize) -> Arc<dyn TxVerifier>,
}

impl DevnetBuilder {
    pub fn new(size: u8) -> Self {
        Self {
            size,
            nonce: node_nonce,
            verifier: default_verifier,
        }
    }

    pub fn nonce(mut self, nonce: fn(usize, u64) -> u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn verifier(mut self, verifier: fn(usize) -> Arc<dyn TxVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Spawns one service per bookkeeper. Must run inside a tokio runtime.
    pub fn build(self) -> Devnet {
        let keys = committee(self.size);
        let genesis = genesis(&keys);
        let hub = LocalHub::new(256);

        let nodes = keys
            .iter()
            .enumerate()
            .map(|(index, keypair)| {
                let chain = store(&genesis);
                let bus = chain.bus().clone();
                let pool = MemoryPool::with_verifier(64, (self.verifier)(index), bus.clone());
                let port = hub.add_node();
                assert_eq!(port.index, index);

                let (service, handle) = DbftService::new(
                    DbftConfig::for_testing(),
                    keypair.clone(),
                    chain.clone(),
                    pool.clone(),
                    port.outbox.clone(),
                    bus,
                )
                .unwrap();
                let nonce = self.nonce;
                let mut round = 0u64;
                service
                    .with_clock(clock)
                    .with_nonce_source(move || {
                        round += 1;
                        nonce(index, round)
                    })
                    .spawn();

                let inbound = handle.clone();
                hub.attach(
                    index,
                    Arc::new(move |payload: ConsensusPayload| {
                        let _ = inbound.deliver(payload);
                    }),
                );
                TestNode {
                    keypair: keypair.clone(),
                    chain,
                    pool,
                    port,
                    handle,
                }
            })
            .collect();

        Devnet { hub, nodes, keys }
    }
}

pub struct Devnet {
    pub hub: Arc<LocalHub>,
    pub nodes: Vec<TestNode>,
    pub keys: Vec<KeyPair>,
}

impl Devnet {
    pub fn start(&self) {
        for node in &self.nodes {
            node.handle.start().unwrap();
        }
    }

    pub fn shutdown(&self) {
        for node in &self.nodes {
            node.handle.halt().unwrap();
        }
        self.hub.shutdown();
    }

    pub fn height(&self, index: usize) -> u32 {
        self.nodes[index].chain.current_height()
    }

    /// Polls until every listed node has committed `height`, giving up after
    /// `limit` of virtual time.
    pub async fn wait_for_height(&self, nodes: &[usize], height: u32, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if nodes.iter().all(|&i| self.height(i) >= height) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn block_hash(&self, index: usize, height: u32) -> Option<UInt256> {
        self.nodes[index].chain.block_at(height).map(|block| block.hash())
    }
}

/// Chain store whose commits can be made to fail on demand.
pub struct CommitGate {
    inner: Arc<MemoryChainStore>,
    failing: AtomicBool,
}

impl CommitGate {
    pub fn new(inner: Arc<MemoryChainStore>) -> Arc<Self> {
        Arc::new(Self { inner, failing: AtomicBool::new(false) })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ChainStore for CommitGate {
    fn current_height(&self) -> u32 {
        self.inner.current_height()
    }

    fn current_hash(&self) -> UInt256 {
        self.inner.current_hash()
    }

    fn header_at(&self, height: u32) -> Option<Header> {
        self.inner.header_at(height)
    }

    fn block_at(&self, height: u32) -> Option<Arc<Block>> {
        self.inner.block_at(height)
    }

    fn bookkeepers_for_next(&self) -> Vec<PublicKey> {
        self.inner.bookkeepers_for_next()
    }

    fn add_block(&self, block: &Block) -> LedgerResult<AddBlockOutcome> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("disk full".into()));
        }
        self.inner.add_block(block)
    }

    fn contains_block(&self, hash: &UInt256) -> bool {
        self.inner.contains_block(hash)
    }

    fn verify_tx(&self, transaction: &Transaction) -> LedgerResult<()> {
        self.inner.verify_tx(transaction)
    }

    fn block_root_with(&self, tx_root: &UInt256) -> UInt256 {
        self.inner.block_root_with(tx_root)
    }
}

/// One service under test; the other bookkeepers are played by the test.
pub struct Solo {
    pub keys: Vec<KeyPair>,
    pub chain: Arc<MemoryChainStore>,
    pub gate: Arc<CommitGate>,
    pub outbox: Arc<Outbox>,
    pub handle: ServiceHandle,
}

impl Solo {
    /// Runs bookkeeper `me` of a committee of `size`.
    pub async fn start(size: u8, me: usize) -> Self {
        let keys = committee(size);
        let signer = keys[me].clone();
        Self::launch(keys, signer).await
    }

    /// Runs a node whose key is not in the committee of `size`.
    pub async fn observer(size: u8) -> Self {
        let signer = KeyPair::from_private_key(&[0xEE; 32]).unwrap();
        Self::launch(committee(size), signer).await
    }

    async fn launch(keys: Vec<KeyPair>, signer: KeyPair) -> Self {
        let chain = store(&genesis(&keys));
        let gate = CommitGate::new(chain.clone());
        let bus = chain.bus().clone();
        let pool = MemoryPool::new(64, bus.clone());
        let outbox = Outbox::new(256);
        let (service, handle) = DbftService::new(
            DbftConfig::for_testing(),
            signer,
            gate.clone(),
            pool,
            outbox.clone(),
            bus,
        )
        .unwrap();
        service.with_clock(clock).with_nonce_source(|| 0x5050).spawn();
        handle.start().unwrap();
        settle().await;
        Self { keys, chain, gate, outbox, handle }
    }

    /// Context of bookkeeper `index` at the current height, for crafting
    /// its payloads.
    pub fn peer(&self, index: usize) -> ConsensusContext {
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(self.keys[index].public_key(), self.chain.as_ref())
            .unwrap();
        ctx
    }

    /// `peer` proposes `transactions` (after the bookkeeping transaction for
    /// `nonce`). Returns the payload and the proposed header hash.
    pub fn proposal(
        &self,
        peer: &mut ConsensusContext,
        nonce: u64,
        transactions: Vec<Transaction>,
    ) -> (ConsensusPayload, UInt256) {
        let index = peer.self_index.unwrap() as usize;
        let mut body = vec![Transaction::bookkeeping(nonce)];
        body.extend(transactions);
        peer.set_proposal(peer.prev_timestamp + 1, nonce, body);
        let hash = peer.make_header(self.chain.as_ref()).unwrap().hash();
        peer.signatures[index] = Some(self.keys[index].sign(hash.as_bytes()).unwrap());
        let message = peer.make_prepare_request().unwrap();
        (self.signed(peer, &message), hash)
    }

    /// Bookkeeper `index` signs `hash` and answers the current proposal.
    pub fn response(&self, index: usize, hash: &UInt256) -> ConsensusPayload {
        let backup = self.peer(index);
        let signature = self.keys[index].sign(hash.as_bytes()).unwrap();
        self.signed(&backup, &backup.make_prepare_response(signature))
    }

    pub fn signed(&self, peer: &ConsensusContext, message: &ConsensusMessage) -> ConsensusPayload {
        let index = peer.self_index.unwrap() as usize;
        let mut payload = peer.make_payload(message).unwrap();
        payload.sign(&self.keys[index]).unwrap();
        payload
    }

    pub async fn deliver(&self, payload: ConsensusPayload) {
        self.handle.deliver(payload).unwrap();
        settle().await;
    }

    /// Everything the service broadcast since the last call.
    pub fn sent(&self) -> Vec<ConsensusMessage> {
        std::iter::from_fn(|| self.outbox.try_recv())
            .map(|payload| decode(&payload))
            .collect()
    }
}
