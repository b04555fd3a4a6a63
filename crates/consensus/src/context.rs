// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use std::sync::Arc;

use onyx_core::committee::{canonical_order, next_bookkeeper_address};
use onyx_core::{quorum, Block, ConsensusPayload, Header, Transaction};
use onyx_cryptography::{CryptoResult, PublicKey, Signature};
use onyx_ledger::ChainStore;
use onyx_primitives::{UInt160, UInt256};
use serde::Serialize;

use crate::messages::*;
use crate::{ConsensusError, ConsensusResult, ConsensusState};

/// The bookkeepers governing one height, in canonical key order.
///
/// Immutable once built; `next_bookkeeper` is derived at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committee {
    keys: Arc<[PublicKey]>,
    next_bookkeeper: UInt160,
}

impl Committee {
    pub fn new(keys: Vec<PublicKey>) -> CryptoResult<Self> {
        let keys = canonical_order(keys);
        let next_bookkeeper = next_bookkeeper_address(&keys)?;
        Ok(Self { keys: keys.into(), next_bookkeeper })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn get(&self, index: ViewIndex) -> Option<&PublicKey> {
        self.keys.get(index as usize)
    }

    pub fn index_of(&self, key: &PublicKey) -> Option<ViewIndex> {
        self.keys.iter().position(|k| k == key).map(|i| i as ViewIndex)
    }

    #[inline]
    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// Signatures needed to commit, `N - (N - 1) / 3`.
    #[inline]
    pub fn quorum(&self) -> usize {
        quorum(self.keys.len())
    }

    #[inline]
    pub fn next_bookkeeper(&self) -> UInt160 {
        self.next_bookkeeper
    }
}

/// `(height - view) mod n`, never negative.
pub fn primary_index(height: u32, view: ViewNumber, nr_bookkeepers: usize) -> ViewIndex {
    if nr_bookkeepers == 0 {
        return 0;
    }
    let n = nr_bookkeepers as i64;
    let primary = (height as i64 - view as i64) % n;
    if primary >= 0 {
        primary as ViewIndex
    } else {
        (primary + n) as ViewIndex
    }
}

/// Per-height consensus state owned by the service.
#[derive(Debug, Clone)]
pub struct ConsensusContext {
    pub version: u32,
    pub state: ConsensusState,
    pub prev_hash: UInt256,
    pub prev_timestamp: u32,
    pub height: u32,
    pub view: ViewNumber,
    pub committee: Committee,
    pub self_index: Option<ViewIndex>,
    pub primary_index: ViewIndex,
    pub timestamp: u32,
    pub nonce: u64,
    pub next_bookkeeper: UInt160,
    pub transactions: Vec<Transaction>,
    pub signatures: Vec<Option<Signature>>,
    pub expected_view: Vec<ViewNumber>,
    header: Option<Header>,
}

/// Point-in-time view of a [`ConsensusContext`] for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub started: bool,
    pub height: u32,
    pub view: ViewNumber,
    pub state: ConsensusState,
    pub state_detail: String,
    pub primary_index: ViewIndex,
    pub self_index: Option<ViewIndex>,
    pub bookkeepers: usize,
    pub signatures: usize,
    pub expected_view: Vec<ViewNumber>,
    pub transactions: usize,
}

impl ConsensusContext {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            state: ConsensusState::INITIAL,
            prev_hash: UInt256::zero(),
            prev_timestamp: 0,
            height: 0,
            view: 0,
            committee: Committee::default(),
            self_index: None,
            primary_index: 0,
            timestamp: 0,
            nonce: 0,
            next_bookkeeper: UInt160::zero(),
            transactions: Vec::new(),
            signatures: Vec::new(),
            expected_view: Vec::new(),
            header: None,
        }
    }

    /// Starts the height after the chain tip at view 0.
    pub fn reset(&mut self, self_key: &PublicKey, chain: &dyn ChainStore) -> ConsensusResult<()> {
        let tip = chain.current_height();
        let prev = chain
            .header_at(tip)
            .ok_or_else(|| ConsensusError::Transient(format!("header {tip} unavailable")))?;
        let committee = Committee::new(chain.bookkeepers_for_next())
            .map_err(|e| ConsensusError::Fatal(format!("committee: {e}")))?;
        let n = committee.len();
        let height = tip.saturating_add(1);

        *self = Self {
            version: self.version,
            state: ConsensusState::INITIAL,
            prev_hash: prev.hash(),
            prev_timestamp: prev.timestamp,
            height,
            view: 0,
            self_index: committee.index_of(self_key),
            primary_index: primary_index(height, 0, n),
            timestamp: 0,
            nonce: 0,
            next_bookkeeper: committee.next_bookkeeper(),
            transactions: Vec::new(),
            signatures: vec![None; n],
            expected_view: vec![0; n],
            header: None,
            committee,
        };
        Ok(())
    }

    /// Moves to `view`, keeping only [`ConsensusState::SIGNATURE_SENT`].
    ///
    /// The proposal is discarded unless this node already signed it.
    /// `expected_view` is left untouched.
    pub fn change_view(&mut self, view: ViewNumber) {
        self.state &= ConsensusState::SIGNATURE_SENT;
        self.view = view;
        self.primary_index = primary_index(self.height, view, self.committee.len());
        if self.state.is_initial() {
            self.transactions.clear();
            self.signatures.iter_mut().for_each(|s| *s = None);
            self.header = None;
        }
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.self_index == Some(self.primary_index)
    }

    #[inline]
    pub fn has(&self, flag: ConsensusState) -> bool {
        self.state.contains(flag)
    }

    #[inline]
    pub fn quorum(&self) -> usize {
        self.committee.quorum()
    }

    pub fn signatures_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn self_key(&self) -> Option<&PublicKey> {
        self.self_index.and_then(|i| self.committee.get(i))
    }

    /// The header a proposal with these fields would produce at this height.
    pub fn header_for(
        &self,
        chain: &dyn ChainStore,
        timestamp: u32,
        nonce: u64,
        next_bookkeeper: UInt160,
        transactions: &[Transaction],
    ) -> Header {
        let tx_root = Block::compute_tx_root(transactions);
        Header {
            version: self.version,
            prev_hash: self.prev_hash,
            tx_root,
            block_root: chain.block_root_with(&tx_root),
            timestamp,
            height: self.height,
            consensus_data: nonce,
            next_bookkeeper,
            ..Header::default()
        }
    }

    /// The proposed header, built once per proposal. `None` before a
    /// proposal exists.
    pub fn make_header(&mut self, chain: &dyn ChainStore) -> Option<&Header> {
        if self.transactions.is_empty() {
            return None;
        }
        if self.header.is_none() {
            let header = self.header_for(
                chain,
                self.timestamp,
                self.nonce,
                self.next_bookkeeper,
                &self.transactions,
            );
            self.header = Some(header);
        }
        self.header.as_ref()
    }

    #[inline]
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Installs a locally built proposal.
    pub fn set_proposal(&mut self, timestamp: u32, nonce: u64, transactions: Vec<Transaction>) {
        self.timestamp = timestamp;
        self.nonce = nonce;
        self.next_bookkeeper = self.committee.next_bookkeeper();
        self.transactions = transactions;
        self.header = None;
    }

    /// Absorbs the primary's proposal whose signature was already checked
    /// against `header`.
    pub fn accept_prepare_request(
        &mut self,
        timestamp: u32,
        request: PrepareRequest,
        header: Header,
    ) {
        self.state |= ConsensusState::REQUEST_RECEIVED;
        self.timestamp = timestamp;
        self.nonce = request.nonce;
        self.next_bookkeeper = request.next_bookkeeper;
        self.transactions = request.transactions;
        self.header = Some(header);
        self.signatures.iter_mut().for_each(|s| *s = None);
        if let Some(slot) = self.signatures.get_mut(self.primary_index as usize) {
            *slot = Some(request.signature);
        }
    }

    /// Wraps `message` in an unsigned payload from this node. `None` for
    /// observers.
    pub fn make_payload(&self, message: &ConsensusMessage) -> Option<ConsensusPayload> {
        let index = self.self_index?;
        let owner = self.committee.get(index)?.clone();
        Some(ConsensusPayload {
            version: self.version,
            prev_hash: self.prev_hash,
            height: self.height,
            bookkeeper_index: index,
            timestamp: self.timestamp,
            data: message.encode(),
            owner,
            programs: Vec::new(),
        })
    }

    pub fn make_change_view(&self, new_view: ViewNumber) -> ConsensusMessage {
        ConsensusMessage::new(self.view, MessageBody::ChangeView(ChangeView { new_view }))
    }

    /// The proposal with this node's own signature. `None` unless this node
    /// holds a signed proposal.
    pub fn make_prepare_request(&self) -> Option<ConsensusMessage> {
        let signature = self.signatures.get(self.self_index? as usize).copied().flatten()?;
        Some(ConsensusMessage::new(
            self.view,
            MessageBody::PrepareRequest(PrepareRequest {
                nonce: self.nonce,
                next_bookkeeper: self.next_bookkeeper,
                transactions: self.transactions.clone(),
                signature,
            }),
        ))
    }

    pub fn make_prepare_response(&self, signature: Signature) -> ConsensusMessage {
        ConsensusMessage::new(
            self.view,
            MessageBody::PrepareResponse(PrepareResponse { signature }),
        )
    }

    pub fn make_block_signatures(&self) -> ConsensusMessage {
        ConsensusMessage::new(
            self.view,
            MessageBody::BlockSignatures(BlockSignatures {
                entries: self.signature_entries(),
            }),
        )
    }

    pub fn signature_entries(&self) -> Vec<SignatureEntry> {
        self.signatures
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.map(|signature| SignatureEntry {
                    index: i as ViewIndex,
                    signature,
                })
            })
            .collect()
    }

    /// Assembles the signed block: cached header, committee, every present
    /// signature in bookkeeper order, and the proposal's transactions.
    pub fn make_block(&mut self, chain: &dyn ChainStore) -> Option<Block> {
        let mut header = self.make_header(chain)?.clone();
        header.bookkeepers = self.committee.keys().to_vec();
        header.sig_data = self.signatures.iter().flatten().copied().collect();
        Some(Block::new(header, self.transactions.clone()))
    }

    pub fn snapshot(&self, started: bool) -> ContextSnapshot {
        ContextSnapshot {
            started,
            height: self.height,
            view: self.view,
            state: self.state,
            state_detail: self.state.detail(),
            primary_index: self.primary_index,
            self_index: self.self_index,
            bookkeepers: self.committee.len(),
            signatures: self.signatures_count(),
            expected_view: self.expected_view.clone(),
            transactions: self.transactions.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use onyx_core::LedgerBus;
    use onyx_cryptography::KeyPair;
    use onyx_ledger::MemoryChainStore;

    pub(crate) fn keys(n: u8) -> Vec<KeyPair> {
        let mut keys: Vec<KeyPair> = (1..=n)
            .map(|i| KeyPair::from_private_key(&[i; 32]).unwrap())
            .collect();
        keys.sort_by(|a, b| a.public_key().cmp(b.public_key()));
        keys
    }

    pub(crate) fn chain(keys: &[KeyPair]) -> MemoryChainStore {
        let publics = keys.iter().map(|k| k.public_key().clone()).collect();
        MemoryChainStore::new(Block::genesis(publics, 1_000).unwrap(), LedgerBus::new()).unwrap()
    }

    #[test]
    fn primary_index_wraps() {
        assert_eq!(primary_index(1, 0, 4), 1);
        assert_eq!(primary_index(1, 1, 4), 0);
        assert_eq!(primary_index(1, 2, 4), 3);
        assert_eq!(primary_index(2, 7, 4), 3);
        assert_eq!(primary_index(9, 0, 7), 2);
        assert_eq!(primary_index(3, 0, 0), 0);
    }

    #[test]
    fn committee_is_canonical() {
        let keys = keys(4);
        let mut reversed: Vec<PublicKey> = keys.iter().rev().map(|k| k.public_key().clone()).collect();
        reversed.push(keys[0].public_key().clone());
        let committee = Committee::new(reversed).unwrap();
        assert_eq!(committee.len(), 4);
        assert_eq!(committee.quorum(), 3);
        assert_eq!(committee.index_of(keys[2].public_key()), Some(2));
        assert_eq!(committee.get(4), None);

        // Same address the genesis block binds for its successor.
        let genesis = chain(&keys).block_at(0).unwrap();
        assert_eq!(committee.next_bookkeeper(), genesis.header.next_bookkeeper);
    }

    #[test]
    fn reset_tracks_chain_tip() {
        let keys = keys(4);
        let chain = chain(&keys);
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(keys[3].public_key(), &chain).unwrap();

        assert_eq!(ctx.height, 1);
        assert_eq!(ctx.view, 0);
        assert_eq!(ctx.prev_hash, chain.current_hash());
        assert_eq!(ctx.prev_timestamp, 1_000);
        assert_eq!(ctx.self_index, Some(3));
        assert_eq!(ctx.primary_index, 1);
        assert_eq!(ctx.signatures, vec![None; 4]);
        assert_eq!(ctx.expected_view, vec![0; 4]);
        assert!(ctx.state.is_initial());

        let outsider = KeyPair::from_private_key(&[99; 32]).unwrap();
        ctx.reset(outsider.public_key(), &chain).unwrap();
        assert_eq!(ctx.self_index, None);
        assert!(ctx.make_payload(&ctx.make_change_view(1)).is_none());
    }

    #[test]
    fn change_view_clears_unsigned_proposal() {
        let keys = keys(4);
        let chain = chain(&keys);
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(keys[0].public_key(), &chain).unwrap();
        ctx.state = ConsensusState::BACKUP | ConsensusState::REQUEST_RECEIVED;
        ctx.set_proposal(1_001, 7, vec![Transaction::bookkeeping(7)]);
        ctx.signatures[1] = Some(Signature::new([1; 64]));
        ctx.expected_view[2] = 1;
        assert!(ctx.make_header(&chain).is_some());

        ctx.change_view(1);
        assert!(ctx.state.is_initial());
        assert_eq!(ctx.primary_index, 0);
        assert!(ctx.transactions.is_empty());
        assert_eq!(ctx.signatures_count(), 0);
        assert!(ctx.header().is_none());
        assert_eq!(ctx.expected_view[2], 1);
    }

    #[test]
    fn change_view_keeps_signed_proposal() {
        let keys = keys(4);
        let chain = chain(&keys);
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(keys[1].public_key(), &chain).unwrap();
        ctx.state = ConsensusState::PRIMARY
            | ConsensusState::REQUEST_SENT
            | ConsensusState::SIGNATURE_SENT;
        ctx.set_proposal(1_001, 7, vec![Transaction::bookkeeping(7)]);
        let hash = ctx.make_header(&chain).unwrap().hash();
        ctx.signatures[1] = Some(keys[1].sign(hash.as_bytes()).unwrap());

        ctx.change_view(2);
        assert_eq!(ctx.state, ConsensusState::SIGNATURE_SENT);
        assert_eq!(ctx.view, 2);
        assert_eq!(ctx.primary_index, 3);
        assert_eq!(ctx.signatures_count(), 1);
        assert_eq!(ctx.header().map(Header::hash), Some(hash));
    }

    #[test]
    fn header_is_cached_and_block_carries_signatures_in_order() {
        let keys = keys(4);
        let chain = chain(&keys);
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(keys[1].public_key(), &chain).unwrap();
        assert!(ctx.make_header(&chain).is_none());

        ctx.set_proposal(1_001, 0x1111, vec![Transaction::bookkeeping(0x1111)]);
        let header = ctx.make_header(&chain).unwrap().clone();
        assert_eq!(header.height, 1);
        assert_eq!(header.consensus_data, 0x1111);
        assert_eq!(header.next_bookkeeper, ctx.committee.next_bookkeeper());
        assert_eq!(header.block_root, chain.block_root_with(&header.tx_root));
        assert_eq!(ctx.make_header(&chain).unwrap(), &header);

        let hash = header.hash();
        for i in [3usize, 0, 2] {
            ctx.signatures[i] = Some(keys[i].sign(hash.as_bytes()).unwrap());
        }
        let block = ctx.make_block(&chain).unwrap();
        assert_eq!(block.hash(), hash);
        assert_eq!(block.header.bookkeepers, ctx.committee.keys());
        assert_eq!(
            block.header.sig_data,
            vec![
                ctx.signatures[0].unwrap(),
                ctx.signatures[2].unwrap(),
                ctx.signatures[3].unwrap()
            ]
        );
        let entries: Vec<ViewIndex> = ctx.signature_entries().iter().map(|e| e.index).collect();
        assert_eq!(entries, vec![0, 2, 3]);
    }

    #[test]
    fn payload_is_stamped_from_context() {
        let keys = keys(4);
        let chain = chain(&keys);
        let mut ctx = ConsensusContext::new(0);
        ctx.reset(keys[2].public_key(), &chain).unwrap();
        ctx.change_view(3);
        ctx.timestamp = 1_234;

        let message = ctx.make_change_view(4);
        let payload = ctx.make_payload(&message).unwrap();
        assert_eq!(payload.height, 1);
        assert_eq!(payload.prev_hash, ctx.prev_hash);
        assert_eq!(payload.bookkeeper_index, 2);
        assert_eq!(payload.timestamp, 1_234);
        assert_eq!(&payload.owner, keys[2].public_key());
        let decoded = ConsensusMessage::decode(&payload.data).unwrap();
        assert_eq!(decoded.view, 3);
        assert_eq!(decoded.body, MessageBody::ChangeView(ChangeView { new_view: 4 }));
    }
}
