//! End-to-end rounds over an in-process network.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use onyx_consensus::{ConsensusMessage, MessageBody, MessageType};
use onyx_core::{Block, ConsensusPayload, Header, Transaction, TransactionPayload};
use onyx_cryptography::merkle;
use onyx_ledger::{ChainStore, DefaultTxVerifier, TxPoolError, TxVerifier};
use onyx_primitives::UInt256;
use parking_lot::Mutex;

const POISON: &[u8] = &[0xFF];

/// Records every ChangeView as (sender, message view, requested view).
fn change_view_log(
    net: &Devnet,
    deliver: fn(usize, usize) -> bool,
) -> Arc<Mutex<Vec<(usize, u8, u8)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    net.hub.set_filter(Arc::new(move |from: usize, to: usize, payload: &ConsensusPayload| {
        if let Ok(ConsensusMessage {
            view,
            body: MessageBody::ChangeView(cv),
        }) = ConsensusMessage::decode(&payload.data)
        {
            let mut log = sink.lock();
            if !log.iter().any(|&(sender, v, _)| sender == from && v == view) {
                log.push((from, view, cv.new_view));
            }
        }
        deliver(from, to)
    }));
    log
}

#[tokio::test(start_paused = true)]
async fn test_honest_round_commits_identical_block() {
    let net = DevnetBuilder::new(4).nonce(|_, _| 0x1111).build();
    net.start();
    assert!(net.wait_for_height(&[0, 1, 2, 3], 1, Duration::from_secs(5)).await);

    let genesis = net.nodes[0].chain.block_at(0).unwrap();
    let tx_root = Block::compute_tx_root(&[Transaction::bookkeeping(0x1111)]);
    let expected = Header {
        prev_hash: genesis.hash(),
        tx_root,
        block_root: merkle::compute_root(&[genesis.header.tx_root, tx_root]),
        timestamp: GENESIS_TIMESTAMP + 1,
        height: 1,
        consensus_data: 0x1111,
        next_bookkeeper: genesis.header.next_bookkeeper,
        ..Header::default()
    }
    .hash();

    for node in &net.nodes {
        let block = node.chain.block_at(1).unwrap();
        assert_eq!(block.hash(), expected);
        assert_eq!(block.transactions, vec![Transaction::bookkeeping(0x1111)]);
        assert!(block.header.sig_data.len() >= 3);
    }
    net.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_silent_primary_is_replaced() {
    let net = DevnetBuilder::new(4).build();
    // Height 1, view 0: node 1 proposes. Nothing it sends arrives.
    let log = change_view_log(&net, |from, _| from != 1);
    net.start();

    tokio::time::sleep(Duration::from_millis(1_990)).await;
    assert!(log.lock().is_empty());
    assert_eq!(net.height(0), 0);

    assert!(net.wait_for_height(&[0, 2, 3], 1, Duration::from_secs(5)).await);
    let mut requests = log.lock().clone();
    requests.retain(|&(from, _, _)| from != 1);
    requests.sort();
    assert_eq!(requests, vec![(0, 0, 1), (2, 0, 1), (3, 0, 1)]);

    // View 1 elects node 0, which proposed with its first nonce.
    let block = net.nodes[0].chain.block_at(1).unwrap();
    assert_eq!(block.header.consensus_data, node_nonce(0, 1));
    assert_eq!(net.block_hash(2, 1), Some(block.hash()));
    assert_eq!(net.block_hash(3, 1), Some(block.hash()));
    net.shutdown();
}

fn reject_poison(index: usize) -> Arc<dyn TxVerifier> {
    if index == 1 {
        return Arc::new(DefaultTxVerifier);
    }
    Arc::new(|tx: &Transaction| match &tx.payload {
        TransactionPayload::Invoke { code } if code.as_slice() == POISON => {
            Err(TxPoolError::Rejected("poisoned script".into()))
        }
        _ => DefaultTxVerifier.verify_transaction(tx),
    })
}

#[tokio::test(start_paused = true)]
async fn test_invalid_transaction_triggers_view_change() {
    let net = DevnetBuilder::new(4).verifier(reject_poison).build();
    let poison = Transaction::invoke(POISON.to_vec());
    net.nodes[1].pool.try_add(poison.clone()).unwrap();
    let log = change_view_log(&net, |_, _| true);
    net.start();

    // Well before any backup timer would expire.
    assert!(net.wait_for_height(&[0, 2, 3], 1, Duration::from_millis(500)).await);
    let mut backups: Vec<usize> = log.lock().iter().map(|&(from, _, _)| from).collect();
    backups.sort();
    assert_eq!(backups, vec![0, 2, 3]);

    let block = net.nodes[2].chain.block_at(1).unwrap();
    assert_eq!(block.header.consensus_data, node_nonce(0, 1));
    assert!(!block.transactions.contains(&poison));
    assert_eq!(net.block_hash(0, 1), Some(block.hash()));
    assert_eq!(net.block_hash(3, 1), Some(block.hash()));
    net.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_partitioned_minority_catches_up() {
    let net = DevnetBuilder::new(7).build();
    let missed: Arc<Mutex<Vec<ConsensusPayload>>> = Arc::default();
    let record = Arc::clone(&missed);
    net.hub.set_filter(Arc::new(move |from: usize, to: usize, payload: &ConsensusPayload| {
        let cut = from >= 5 || to >= 5;
        if cut && to == 5 && payload.height == 1 {
            record.lock().push(payload.clone());
        }
        !cut
    }));
    net.start();

    assert!(net.wait_for_height(&[0, 1, 2, 3, 4], 1, Duration::from_secs(1)).await);
    assert_eq!(net.height(5), 0);
    assert_eq!(net.height(6), 0);
    let committed = net.block_hash(0, 1).unwrap();
    for i in 1..5 {
        assert_eq!(net.block_hash(i, 1), Some(committed));
    }

    net.hub.clear_filter();
    let missed = missed.lock().clone();
    let request = missed
        .iter()
        .find(|p| decode(p).message_type() == MessageType::PrepareRequest)
        .unwrap()
        .clone();
    let signatures = missed
        .iter()
        .find(|p| decode(p).message_type() == MessageType::BlockSignatures)
        .unwrap()
        .clone();
    for laggard in [5, 6] {
        let handle = &net.nodes[laggard].handle;
        handle.deliver(request.clone()).unwrap();
        handle.deliver(signatures.clone()).unwrap();
    }

    assert!(net.wait_for_height(&[5, 6], 1, Duration::from_millis(100)).await);
    assert_eq!(net.block_hash(5, 1), Some(committed));
    assert_eq!(net.block_hash(6, 1), Some(committed));

    // With the partition healed all seven keep going together.
    assert!(net.wait_for_height(&[0, 1, 2, 3, 4, 5, 6], 2, Duration::from_secs(5)).await);
    let next = net.block_hash(0, 2).unwrap();
    assert!((1..7).all(|i| net.block_hash(i, 2) == Some(next)));
    net.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_nodes_agree_over_several_heights() {
    let net = DevnetBuilder::new(4).build();
    for (i, node) in net.nodes.iter().enumerate() {
        node.pool
            .try_add(Transaction::invoke(vec![0x10 + i as u8]))
            .unwrap();
    }
    net.start();
    assert!(net.wait_for_height(&[0, 1, 2, 3], 4, Duration::from_secs(20)).await);

    let mut included = Vec::new();
    for height in 1..=4 {
        let hash = net.block_hash(0, height).unwrap();
        for i in 1..4 {
            assert_eq!(net.block_hash(i, height), Some(hash), "height {height}, node {i}");
        }
        let block = net.nodes[0].chain.block_at(height).unwrap();
        // Heights 1..=4 are proposed by nodes 1, 2, 3, 0.
        assert_eq!(block.header.consensus_data, node_nonce(height as usize % 4, 1));
        assert!(block.transactions[0].is_bookkeeping());
        included.extend(block.transactions[1..].iter().cloned());
    }
    // Each proposer drained its own pool; nothing was committed twice.
    let distinct: HashSet<UInt256> = included.iter().map(Transaction::hash).collect();
    assert_eq!(included.len(), 4);
    assert_eq!(distinct.len(), 4);
    for node in &net.nodes {
        assert_eq!(node.pool.count(), 0);
    }
    net.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_single_bookkeeper_commits_alone() {
    let net = DevnetBuilder::new(1).build();
    net.start();
    assert!(net.wait_for_height(&[0], 3, Duration::from_secs(10)).await);
    let block = net.nodes[0].chain.block_at(3).unwrap();
    assert_eq!(block.header.sig_data.len(), 1);
    assert_eq!(block.header.timestamp, GENESIS_TIMESTAMP + 3);
    net.shutdown();
}
