// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Typed publish/subscribe bus.
//!
//! Subscribers register a handler for one event kind and get back a
//! [`Subscription`]; dropping it removes the handler. Handlers run on the
//! publisher's thread, outside the registry lock, so a handler may publish or
//! subscribe without deadlocking.

use crate::Block;
use onyx_primitives::UInt256;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// An event that can be routed by kind.
pub trait BusEvent: Clone + Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E: BusEvent> {
    handlers: RwLock<HashMap<E::Kind, Vec<(usize, Handler<E>)>>>,
    next_id: AtomicUsize,
}

impl<E: BusEvent> Registry<E> {
    fn remove(&self, kind: E::Kind, id: usize) {
        let mut handlers = self.handlers.write();
        if let Some(entry) = handlers.get_mut(&kind) {
            entry.retain(|(existing, _)| *existing != id);
            if entry.is_empty() {
                handlers.remove(&kind);
            }
        }
    }
}

/// Cloneable handle to a shared registry.
pub struct EventBus<E: BusEvent> {
    inner: Arc<Registry<E>>,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<E::Kind, usize> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|(kind, entry)| (*kind, entry.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(1),
            }),
        }
    }

    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id: Some(id),
        }
    }

    /// Delivers `event` to every handler registered for its kind. Returns the
    /// number of handlers invoked.
    pub fn publish(&self, event: E) -> usize {
        let handlers: Vec<Handler<E>> = match self.inner.handlers.read().get(&event.kind()) {
            Some(entry) => entry.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}

/// Registration token; the handler is removed when this is dropped.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription<E: BusEvent> {
    registry: Weak<Registry<E>>,
    kind: E::Kind,
    id: Option<usize>,
}

impl<E: BusEvent> Subscription<E> {
    pub fn kind(&self) -> E::Kind {
        self.kind
    }

    /// Explicitly removes the handler.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(self.kind, id);
            }
        }
    }
}

impl<E: BusEvent> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: BusEvent> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// Notifications emitted by the ledger and the transaction pool.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A block was durably committed. Fires once per height.
    BlockPersisted(Arc<Block>),
    TransactionPooled(UInt256),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerEventKind {
    BlockPersisted,
    TransactionPooled,
}

impl BusEvent for LedgerEvent {
    type Kind = LedgerEventKind;

    fn kind(&self) -> LedgerEventKind {
        match self {
            LedgerEvent::BlockPersisted(_) => LedgerEventKind::BlockPersisted,
            LedgerEvent::TransactionPooled(_) => LedgerEventKind::TransactionPooled,
        }
    }
}

pub type LedgerBus = EventBus<LedgerEvent>;
