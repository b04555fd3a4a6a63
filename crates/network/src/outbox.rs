// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Bounded, non-blocking outbound queue.

use onyx_core::ConsensusPayload;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Sink for payloads leaving the consensus engine.
///
/// `broadcast` must never block: the engine calls it from inside its event
/// handlers.
pub trait ConsensusBroadcaster: Send + Sync {
    fn broadcast(&self, payload: ConsensusPayload);
}

/// Queue between the consensus engine and the transport.
///
/// When full, the oldest queued payload is discarded to make room.
#[derive(Debug)]
pub struct Outbox {
    queue: Mutex<VecDeque<ConsensusPayload>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl Outbox {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueues `payload`. Returns `false` if an older payload was evicted
    /// or the outbox is closed.
    pub fn push(&self, payload: ConsensusPayload) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut evicted = false;
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                evicted = true;
            }
            queue.push_back(payload);
        }
        if evicted {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                capacity = self.capacity,
                dropped = total,
                "outbox full, dropped oldest payload"
            );
        }
        self.notify.notify_one();
        !evicted
    }

    pub fn try_recv(&self) -> Option<ConsensusPayload> {
        self.queue.lock().pop_front()
    }

    /// Waits for the next payload. Returns `None` once the outbox is closed
    /// and drained.
    pub async fn recv(&self) -> Option<ConsensusPayload> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.try_recv() {
                return Some(payload);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Stops accepting payloads and wakes any waiting receiver.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Payloads discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ConsensusBroadcaster for Outbox {
    fn broadcast(&self, payload: ConsensusPayload) {
        self.push(payload);
    }
}
