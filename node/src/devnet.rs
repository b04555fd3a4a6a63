// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! A committee of bookkeepers sharing one process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use onyx_config::NodeConfig;
use onyx_consensus::{ContextSnapshot, DbftConfig, DbftService, ServiceHandle};
use onyx_core::time::unix_timestamp;
use onyx_core::{Block, ConsensusPayload, LedgerBus};
use onyx_cryptography::KeyPair;
use onyx_ledger::{ChainStore, MemoryChainStore, MemoryPool};
use onyx_network::LocalHub;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const POOL_CAPACITY: usize = 4_096;

struct Member {
    chain: Arc<MemoryChainStore>,
    handle: ServiceHandle,
    task: JoinHandle<()>,
    _pool: Arc<MemoryPool>,
}

pub struct Devnet {
    hub: Arc<LocalHub>,
    members: Vec<Member>,
}

impl Devnet {
    /// Generates `size` bookkeeper keys, a shared genesis, and one service
    /// per bookkeeper wired through a [`LocalHub`].
    pub fn launch(config: &NodeConfig, size: usize) -> Result<Self> {
        let dbft = DbftConfig::from_settings(&config.consensus)?;
        let keys: Vec<KeyPair> = (0..size).map(|_| KeyPair::random()).collect();
        let publics = keys.iter().map(|k| k.public_key().clone()).collect();
        let genesis = Block::genesis(publics, unix_timestamp().saturating_sub(1))
            .context("building genesis")?;
        info!(
            bookkeepers = size,
            genesis = %genesis.hash(),
            interval = ?dbft.block_interval,
            "launching devnet"
        );

        let hub = LocalHub::new(config.network.outbox_capacity);
        let mut members = Vec::with_capacity(size);
        for keypair in keys {
            let bus = LedgerBus::new();
            let chain = Arc::new(MemoryChainStore::new(genesis.clone(), bus.clone())?);
            let pool = MemoryPool::new(POOL_CAPACITY, bus.clone());
            let port = hub.add_node();

            let (service, handle) = DbftService::new(
                dbft.clone(),
                keypair,
                chain.clone(),
                pool.clone(),
                port.outbox.clone(),
                bus,
            )?;
            let inbound = handle.clone();
            hub.attach(
                port.index,
                Arc::new(move |payload: ConsensusPayload| {
                    if inbound.deliver(payload).is_err() {
                        warn!("payload for a halted service discarded");
                    }
                }),
            );
            members.push(Member {
                chain,
                handle,
                task: service.spawn(),
                _pool: pool,
            });
        }
        Ok(Self { hub, members })
    }

    pub fn start(&self) -> Result<()> {
        for member in &self.members {
            member.handle.start()?;
        }
        Ok(())
    }

    /// Lowest committed height across the committee.
    pub fn height(&self) -> u32 {
        self.members
            .iter()
            .map(|m| m.chain.current_height())
            .min()
            .unwrap_or(0)
    }

    pub async fn wait_for_height(&self, height: u32) {
        while self.height() < height {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn snapshots(&self) -> Vec<ContextSnapshot> {
        self.members.iter().map(|m| m.handle.snapshot()).collect()
    }

    /// Whether every member committed the same block at `height`.
    pub fn agrees_at(&self, height: u32) -> bool {
        let mut hashes = self
            .members
            .iter()
            .map(|m| m.chain.block_at(height).map(|b| b.hash()));
        match hashes.next() {
            Some(Some(first)) => hashes.all(|h| h == Some(first)),
            _ => false,
        }
    }

    pub async fn halt(self) {
        for member in &self.members {
            // Already stopped after a fatal error: nothing to do.
            let _ = member.handle.halt();
        }
        for member in self.members {
            if let Err(e) = member.task.await {
                warn!(error = %e, "consensus task ended abnormally");
            }
        }
        self.hub.shutdown();
    }
}
