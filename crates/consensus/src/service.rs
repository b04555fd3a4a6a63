// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use onyx_core::time::{timestamp_in_band, unix_timestamp};
use onyx_core::{
    Block, ConsensusPayload, Header, LedgerBus, LedgerEvent, LedgerEventKind, Subscription,
    Transaction,
};
use onyx_cryptography::{verify, KeyPair, Signature};
use onyx_ledger::{AddBlockOutcome, ChainStore, LedgerError, TxPool};
use onyx_network::ConsensusBroadcaster;
use onyx_primitives::UInt256;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::context::{ConsensusContext, ContextSnapshot};
use crate::messages::*;
use crate::timer::{delay_on_primary, delay_on_view, HView, ViewTimer};
use crate::{ConsensusError, ConsensusResult, ConsensusState, DbftConfig, DropReason};

/// Unix seconds, as stamped on proposals.
pub type Clock = fn() -> u32;

/// Source of proposal nonces.
pub type NonceSource = Box<dyn FnMut() -> u64 + Send>;

/// Everything the service loop reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    Start,
    Stop,
    Timeout(HView),
    Payload(ConsensusPayload),
    BlockPersisted(Arc<Block>),
}

/// Control surface of a running [`DbftService`].
#[derive(Clone)]
pub struct ServiceHandle {
    tx: UnboundedSender<Event>,
    snapshot: Arc<RwLock<ContextSnapshot>>,
    halted: Arc<AtomicBool>,
}

impl ServiceHandle {
    /// Begins consensus at the height after the chain tip. Idempotent while
    /// running.
    pub fn start(&self) -> ConsensusResult<()> {
        self.send(Event::Start)
    }

    /// Stops the service. Queued events are discarded and later
    /// [`ServiceHandle::start`] calls fail.
    pub fn halt(&self) -> ConsensusResult<()> {
        if self.halted.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // The loop may already be gone after a fatal error.
        let _ = self.tx.send(Event::Stop);
        Ok(())
    }

    /// Queues a payload received from the network.
    pub fn deliver(&self, payload: ConsensusPayload) -> ConsensusResult<()> {
        self.send(Event::Payload(payload))
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    fn send(&self, event: Event) -> ConsensusResult<()> {
        if self.is_halted() {
            return Err(ConsensusError::ChannelClosed);
        }
        self.tx.send(event).map_err(|_| ConsensusError::ChannelClosed)
    }
}

/// The dBFT state machine.
///
/// A single task owns the [`ConsensusContext`] and handles one [`Event`] at a
/// time; timers, the ledger bus and the network only enqueue events.
pub struct DbftService {
    config: DbftConfig,
    keypair: KeyPair,
    chain: Arc<dyn ChainStore>,
    txpool: Arc<dyn TxPool>,
    broadcaster: Arc<dyn ConsensusBroadcaster>,
    bus: LedgerBus,

    ctx: ConsensusContext,
    timer: ViewTimer,
    rx: UnboundedReceiver<Event>,
    events: WeakUnboundedSender<Event>,
    persisted: Option<Subscription<LedgerEvent>>,
    snapshot: Arc<RwLock<ContextSnapshot>>,
    halted: Arc<AtomicBool>,

    started: bool,
    last_persist: Option<Instant>,
    clock: Clock,
    nonce: NonceSource,
}

impl DbftService {
    pub fn new(
        config: DbftConfig,
        keypair: KeyPair,
        chain: Arc<dyn ChainStore>,
        txpool: Arc<dyn TxPool>,
        broadcaster: Arc<dyn ConsensusBroadcaster>,
        bus: LedgerBus,
    ) -> ConsensusResult<(Self, ServiceHandle)> {
        config.validate()?;
        config.check_committee(&chain.bookkeepers_for_next())?;

        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(ContextSnapshot::default()));
        let halted = Arc::new(AtomicBool::new(false));
        let handle = ServiceHandle {
            tx: tx.clone(),
            snapshot: Arc::clone(&snapshot),
            halted: Arc::clone(&halted),
        };

        let service = Self {
            ctx: ConsensusContext::new(config.version),
            timer: ViewTimer::new(tx.downgrade()),
            events: tx.downgrade(),
            config,
            keypair,
            chain,
            txpool,
            broadcaster,
            bus,
            rx,
            persisted: None,
            snapshot,
            halted,
            started: false,
            last_persist: None,
            clock: unix_timestamp,
            nonce: Box::new(rand::random::<u64>),
        };
        Ok((service, handle))
    }

    /// Replaces the wall clock used for proposal timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the random proposal nonce.
    pub fn with_nonce_source<F>(mut self, nonce: F) -> Self
    where
        F: FnMut() -> u64 + Send + 'static,
    {
        self.nonce = Box::new(nonce);
        self
    }

    /// Runs the loop on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        let key = self.keypair.public_key().to_hex();
        let span = info_span!("dbft", key = %&key[..8]);
        tokio::spawn(self.run().instrument(span))
    }

    pub async fn run(mut self) {
        info!("dbft service running");
        while let Some(event) = self.rx.recv().await {
            let result = match event {
                Event::Stop => break,
                event => self.handle_event(event),
            };
            if let Err(err) = result {
                if self.report(err) {
                    break;
                }
            }
            self.publish_snapshot();
        }
        self.shutdown();
    }

    fn handle_event(&mut self, event: Event) -> ConsensusResult<()> {
        match event {
            Event::Start => self.on_start(),
            Event::Stop => Ok(()),
            Event::Payload(_) if !self.started => Err(DropReason::NotStarted.into()),
            _ if !self.started => Ok(()),
            Event::Timeout(view) => self.on_timeout(view),
            Event::Payload(payload) => self.on_payload(payload),
            Event::BlockPersisted(block) => self.on_block_persisted(&block),
        }
    }

    /// Logs `err` at the level of its category. Returns whether the loop
    /// must stop.
    fn report(&self, err: ConsensusError) -> bool {
        let (height, view) = (self.ctx.height, self.ctx.view);
        match &err {
            ConsensusError::MsgDrop(reason) => debug!(height, view, %reason, "payload dropped"),
            ConsensusError::ViewChangeTrigger(reason) => {
                info!(height, view, %reason, "view change requested")
            }
            ConsensusError::Transient(reason) => warn!(height, view, %reason, "transient failure"),
            ConsensusError::Fatal(reason) => error!(height, view, %reason, "halting consensus"),
            ConsensusError::Config(_) | ConsensusError::ChannelClosed => {
                error!(height, view, error = %err, "consensus error")
            }
        }
        err.is_fatal()
    }

    fn publish_snapshot(&self) {
        *self.snapshot.write() = self.ctx.snapshot(self.started);
    }

    fn shutdown(&mut self) {
        self.timer.cancel();
        self.persisted = None;
        self.rx.close();
        self.started = false;
        self.halted.store(true, Ordering::Release);
        self.publish_snapshot();
        info!(height = self.ctx.height, "dbft service stopped");
    }

    fn on_start(&mut self) -> ConsensusResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        let events = self.events.clone();
        self.persisted = Some(self.bus.subscribe(LedgerEventKind::BlockPersisted, move |event| {
            if let (LedgerEvent::BlockPersisted(block), Some(tx)) = (event, events.upgrade()) {
                // Published under the store's commit lock: never block here.
                let _ = tx.send(Event::BlockPersisted(Arc::clone(block)));
            }
        }));

        info!(height = self.chain.current_height(), "dbft service started");
        self.initialize(0)
    }

    fn initialize(&mut self, view: ViewNumber) -> ConsensusResult<()> {
        if view == 0 {
            self.ctx.reset(self.keypair.public_key(), self.chain.as_ref())?;
        } else {
            self.ctx.change_view(view);
        }

        let hview = HView::new(self.ctx.height, view);
        if self.ctx.self_index.is_none() {
            self.timer.cancel();
            info!(height = hview.height, view, "not a bookkeeper, observing");
            return Ok(());
        }

        let interval = self.config.block_interval;
        if self.ctx.is_primary() {
            self.ctx.state |= ConsensusState::PRIMARY;
            let elapsed = self.last_persist.map(|at| at.elapsed());
            self.timer.reset_timeout(hview, delay_on_primary(interval, elapsed));
        } else {
            self.ctx.state |= ConsensusState::BACKUP;
            self.timer.reset_timeout(hview, delay_on_view(view, interval));
        }

        info!(
            height = hview.height,
            view,
            index = ?self.ctx.self_index,
            primary = self.ctx.primary_index,
            state = %self.ctx.state,
            "initialize consensus"
        );
        Ok(())
    }

    fn on_timeout(&mut self, view: HView) -> ConsensusResult<()> {
        if view != HView::new(self.ctx.height, self.ctx.view) {
            trace!(height = view.height, view = view.view_number, "stale timeout");
            return Ok(());
        }
        info!(
            height = view.height,
            view = view.view_number,
            state = %self.ctx.state,
            "timeout"
        );

        let state = self.ctx.state;
        if state.contains(ConsensusState::PRIMARY) && !state.contains(ConsensusState::REQUEST_SENT)
        {
            self.send_prepare_request()
        } else if state.contains(ConsensusState::PRIMARY | ConsensusState::REQUEST_SENT)
            || state.contains(ConsensusState::BACKUP)
        {
            self.request_change_view()
        } else {
            Ok(())
        }
    }

    fn send_prepare_request(&mut self) -> ConsensusResult<()> {
        let Some(me) = self.ctx.self_index else {
            return Ok(());
        };
        self.ctx.state |= ConsensusState::REQUEST_SENT;

        if !self.ctx.has(ConsensusState::SIGNATURE_SENT) {
            let timestamp = self.ctx.prev_timestamp.saturating_add(1).max((self.clock)());
            let nonce = (self.nonce)();
            let transactions = self.collect_transactions(nonce);
            self.ctx.set_proposal(timestamp, nonce, transactions);

            let hash = self.header_hash().ok_or_else(|| {
                ConsensusError::Fatal("proposal without header".into())
            })?;
            let signature = self.sign(&hash)?;
            self.ctx.signatures[me as usize] = Some(signature);
            self.ctx.state |= ConsensusState::SIGNATURE_SENT;
        }

        let message = self.ctx.make_prepare_request().ok_or_else(|| {
            ConsensusError::Fatal("signed proposal missing own signature".into())
        })?;
        self.sign_and_relay(&message)?;
        info!(
            height = self.ctx.height,
            view = self.ctx.view,
            nonce = self.ctx.nonce,
            txs = self.ctx.transactions.len(),
            "prepare request sent"
        );

        let hview = HView::new(self.ctx.height, self.ctx.view);
        self.timer
            .reset_timeout(hview, delay_on_view(self.ctx.view, self.config.block_interval));
        self.check_signatures()
    }

    /// The bookkeeping transaction followed by pooled transactions the
    /// ledger still accepts.
    fn collect_transactions(&self, nonce: u64) -> Vec<Transaction> {
        let pending = self.txpool.pending(self.config.max_txs_per_block);
        let mut transactions = Vec::with_capacity(pending.len() + 1);
        transactions.push(Transaction::bookkeeping(nonce));
        transactions.extend(
            pending
                .into_iter()
                .filter(|tx| !tx.is_bookkeeping() && self.chain.verify_tx(tx).is_ok()),
        );
        transactions
    }

    fn request_change_view(&mut self) -> ConsensusResult<()> {
        if self.ctx.has(ConsensusState::BLOCK_GENERATED) {
            return Ok(());
        }
        let Some(me) = self.ctx.self_index else {
            return Ok(());
        };
        let me = me as usize;
        let new_view = self
            .ctx
            .view
            .saturating_add(1)
            .max(self.ctx.expected_view[me].saturating_add(1));
        self.ctx.expected_view[me] = new_view;

        info!(
            height = self.ctx.height,
            view = self.ctx.view,
            new_view,
            state = %self.ctx.state,
            "request change view"
        );
        let hview = HView::new(self.ctx.height, self.ctx.view);
        self.timer
            .reset_timeout(hview, delay_on_view(new_view, self.config.block_interval));

        let message = self.ctx.make_change_view(new_view);
        self.sign_and_relay(&message)?;
        self.check_expected_view(new_view)
    }

    fn check_expected_view(&mut self, view: ViewNumber) -> ConsensusResult<()> {
        if self.ctx.has(ConsensusState::BLOCK_GENERATED) || view <= self.ctx.view {
            return Ok(());
        }
        let count = self.ctx.expected_view.iter().filter(|&&v| v == view).count();
        if count >= self.ctx.quorum() {
            debug!(height = self.ctx.height, view, count, "view change agreed");
            self.initialize(view)
        } else {
            Ok(())
        }
    }

    fn on_payload(&mut self, payload: ConsensusPayload) -> ConsensusResult<()> {
        let ctx = &self.ctx;
        let index = payload.bookkeeper_index;
        if ctx.self_index == Some(index) {
            return Err(DropReason::OwnPayload.into());
        }
        if payload.version != ctx.version {
            return Err(DropReason::Version {
                expected: ctx.version,
                actual: payload.version,
            }
            .into());
        }
        if payload.height != ctx.height {
            return Err(DropReason::Height {
                expected: ctx.height,
                actual: payload.height,
            }
            .into());
        }
        if payload.prev_hash != ctx.prev_hash {
            return Err(DropReason::PrevHash.into());
        }
        if ctx.has(ConsensusState::BLOCK_GENERATED) {
            return Err(DropReason::BlockGenerated.into());
        }
        let Some(owner) = ctx.committee.get(index) else {
            return Err(DropReason::IndexOutOfRange {
                index,
                count: ctx.committee.len(),
            }
            .into());
        };

        let message = ConsensusMessage::decode(&payload.data)?;
        let is_change_view = matches!(message.body, MessageBody::ChangeView(_));
        if message.view != ctx.view && !is_change_view {
            return Err(DropReason::View {
                expected: ctx.view,
                actual: message.view,
            }
            .into());
        }
        if owner != &payload.owner {
            return Err(DropReason::Owner(index).into());
        }
        if !payload.verify() {
            return Err(DropReason::BadWitness.into());
        }

        match message.body {
            MessageBody::ChangeView(m) => self.on_change_view(index, m),
            MessageBody::PrepareRequest(m) => self.on_prepare_request(&payload, m),
            MessageBody::PrepareResponse(m) => self.on_prepare_response(index, m),
            MessageBody::BlockSignatures(m) => self.on_block_signatures(index, m),
        }
    }

    fn on_change_view(&mut self, index: ViewIndex, message: ChangeView) -> ConsensusResult<()> {
        let expected = self.ctx.expected_view[index as usize];
        info!(
            height = self.ctx.height,
            view = self.ctx.view,
            index,
            new_view = message.new_view,
            "change view received"
        );
        if message.new_view <= expected {
            return Err(DropReason::StaleChangeView {
                new_view: message.new_view,
                expected,
            }
            .into());
        }
        self.ctx.expected_view[index as usize] = message.new_view;
        self.check_expected_view(message.new_view)
    }

    fn on_prepare_request(
        &mut self,
        payload: &ConsensusPayload,
        request: PrepareRequest,
    ) -> ConsensusResult<()> {
        let index = payload.bookkeeper_index;
        let ctx = &self.ctx;
        info!(
            height = ctx.height,
            view = ctx.view,
            index,
            txs = request.transactions.len(),
            "prepare request received"
        );
        if !ctx.has(ConsensusState::BACKUP) || ctx.has(ConsensusState::REQUEST_RECEIVED) {
            return Err(DropReason::State(ctx.state.detail()).into());
        }
        if index != ctx.primary_index {
            return Err(DropReason::NotPrimary {
                sender: index,
                primary: ctx.primary_index,
            }
            .into());
        }
        let now = (self.clock)();
        if !timestamp_in_band(
            ctx.prev_timestamp,
            payload.timestamp,
            now,
            self.config.max_timestamp_drift_secs,
        ) {
            return Err(DropReason::Timestamp {
                prev: ctx.prev_timestamp,
                timestamp: payload.timestamp,
            }
            .into());
        }
        if request.next_bookkeeper != ctx.committee.next_bookkeeper() {
            return Err(DropReason::NextBookkeeper.into());
        }

        let header = ctx.header_for(
            self.chain.as_ref(),
            payload.timestamp,
            request.nonce,
            request.next_bookkeeper,
            &request.transactions,
        );
        let hash = header.hash();
        if !verify(&payload.owner, hash.as_bytes(), &request.signature) {
            return Err(DropReason::Signature(index).into());
        }
        self.ctx.accept_prepare_request(payload.timestamp, request, header);

        let rejected = self
            .ctx
            .transactions
            .iter()
            .skip(1)
            .find_map(|tx| self.check_transaction(tx).err());
        if let Some(reason) = rejected {
            warn!(height = self.ctx.height, view = self.ctx.view, %reason, "proposal carries invalid transaction");
            self.request_change_view()?;
            return Err(ConsensusError::ViewChangeTrigger(reason));
        }

        let Some(me) = self.ctx.self_index else {
            return Ok(());
        };
        let signature = self.sign(&hash)?;
        self.ctx.signatures[me as usize] = Some(signature);
        self.ctx.state |= ConsensusState::SIGNATURE_SENT;
        let message = self.ctx.make_prepare_response(signature);
        self.sign_and_relay(&message)?;
        self.check_signatures()
    }

    fn check_transaction(&self, transaction: &Transaction) -> Result<(), String> {
        self.txpool
            .verify_transaction(transaction)
            .map_err(|e| format!("{}: {e}", transaction.hash()))?;
        self.chain
            .verify_tx(transaction)
            .map_err(|e| format!("{}: {e}", transaction.hash()))
    }

    fn on_prepare_response(
        &mut self,
        index: ViewIndex,
        response: PrepareResponse,
    ) -> ConsensusResult<()> {
        debug!(height = self.ctx.height, view = self.ctx.view, index, "prepare response received");
        if self.ctx.signatures[index as usize].is_some() {
            return Err(DropReason::Duplicate(index).into());
        }
        let Some(hash) = self.header_hash() else {
            return Err(DropReason::State("no proposal yet".into()).into());
        };
        let Some(key) = self.ctx.committee.get(index) else {
            return Err(DropReason::IndexOutOfRange {
                index,
                count: self.ctx.committee.len(),
            }
            .into());
        };
        if !verify(key, hash.as_bytes(), &response.signature) {
            return Err(DropReason::Signature(index).into());
        }
        self.ctx.signatures[index as usize] = Some(response.signature);
        self.check_signatures()
    }

    fn on_block_signatures(
        &mut self,
        index: ViewIndex,
        message: BlockSignatures,
    ) -> ConsensusResult<()> {
        info!(
            height = self.ctx.height,
            view = self.ctx.view,
            index,
            entries = message.entries.len(),
            "block signatures received"
        );
        let Some(hash) = self.header_hash() else {
            return Err(DropReason::State("no proposal yet".into()).into());
        };

        let committee = self.ctx.committee.clone();
        let quorum = committee.quorum();
        for entry in message.entries {
            let slot = entry.index as usize;
            let Some(key) = committee.get(entry.index) else {
                continue;
            };
            if self.ctx.signatures[slot].is_some() {
                continue;
            }
            if !verify(key, hash.as_bytes(), &entry.signature) {
                debug!(index = entry.index, "invalid block signature entry");
                continue;
            }
            self.ctx.signatures[slot] = Some(entry.signature);
            if self.ctx.signatures_count() >= quorum {
                break;
            }
        }
        self.check_signatures()
    }

    /// Commits the block once a quorum of signatures is present.
    fn check_signatures(&mut self) -> ConsensusResult<()> {
        if self.ctx.has(ConsensusState::BLOCK_GENERATED)
            || self.ctx.signatures_count() < self.ctx.quorum()
        {
            return Ok(());
        }
        let Some(block) = self.ctx.make_block(self.chain.as_ref()) else {
            return Ok(());
        };

        let hash = block.hash();
        let outcome = if self.chain.contains_block(&hash) {
            AddBlockOutcome::AlreadyExists
        } else {
            match self.chain.add_block(&block) {
                Ok(outcome) => outcome,
                Err(LedgerError::BlockExists(_)) => AddBlockOutcome::AlreadyExists,
                Err(e) => {
                    return Err(ConsensusError::Transient(format!(
                        "commit of block {} failed: {e}",
                        block.height()
                    )))
                }
            }
        };

        self.ctx.state |= ConsensusState::BLOCK_GENERATED;
        info!(
            height = block.height(),
            view = self.ctx.view,
            %hash,
            signatures = block.header.sig_data.len(),
            ?outcome,
            "block generated"
        );
        let message = self.ctx.make_block_signatures();
        self.sign_and_relay(&message)
    }

    fn on_block_persisted(&mut self, block: &Block) -> ConsensusResult<()> {
        if block.height() < self.ctx.height {
            trace!(height = block.height(), "already past persisted block");
            return Ok(());
        }
        self.last_persist = Some(Instant::now());
        info!(height = block.height(), hash = %block.hash(), "block persisted");
        self.initialize(0)
    }

    fn header_hash(&mut self) -> Option<UInt256> {
        self.ctx.make_header(self.chain.as_ref()).map(Header::hash)
    }

    fn sign(&self, hash: &UInt256) -> ConsensusResult<Signature> {
        self.keypair
            .sign(hash.as_bytes())
            .map_err(|e| ConsensusError::Fatal(format!("local key cannot sign: {e}")))
    }

    fn sign_and_relay(&self, message: &ConsensusMessage) -> ConsensusResult<()> {
        let Some(mut payload) = self.ctx.make_payload(message) else {
            return Ok(());
        };
        payload
            .sign(&self.keypair)
            .map_err(|e| ConsensusError::Fatal(format!("local key cannot sign: {e}")))?;
        trace!(kind = ?message.message_type(), view = message.view, "relay");
        self.broadcaster.broadcast(payload);
        Ok(())
    }
}
