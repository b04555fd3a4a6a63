// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! In-process transport connecting several consensus nodes.

use crate::Outbox;
use onyx_core::ConsensusPayload;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Receives payloads addressed to one node.
pub type PayloadSink = Arc<dyn Fn(ConsensusPayload) + Send + Sync>;

/// Decides whether a payload sent by node `from` reaches node `to`.
pub type DeliveryFilter = Arc<dyn Fn(usize, usize, &ConsensusPayload) -> bool + Send + Sync>;

/// A node's attachment point on a [`LocalHub`].
#[derive(Debug, Clone)]
pub struct HubPort {
    pub index: usize,
    pub outbox: Arc<Outbox>,
}

struct Peer {
    outbox: Arc<Outbox>,
    sink: Option<PayloadSink>,
}

/// Fans every node's outbox out to all other attached nodes.
///
/// One pump task per node drains its outbox; delivery honours the optional
/// [`DeliveryFilter`], which tests use to model partitions.
pub struct LocalHub {
    peers: RwLock<Vec<Peer>>,
    filter: RwLock<Option<DeliveryFilter>>,
    pumps: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    outbox_capacity: usize,
}

impl LocalHub {
    pub fn new(outbox_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            peers: RwLock::new(Vec::new()),
            filter: RwLock::new(None),
            pumps: parking_lot::Mutex::new(Vec::new()),
            outbox_capacity,
        })
    }

    /// Registers a node and starts pumping its outbox. Must be called inside
    /// a tokio runtime.
    pub fn add_node(self: &Arc<Self>) -> HubPort {
        let outbox = Outbox::new(self.outbox_capacity);
        let index = {
            let mut peers = self.peers.write();
            peers.push(Peer {
                outbox: Arc::clone(&outbox),
                sink: None,
            });
            peers.len() - 1
        };

        let weak = Arc::downgrade(self);
        let source = Arc::clone(&outbox);
        let pump = tokio::spawn(async move {
            while let Some(payload) = source.recv().await {
                let Some(hub) = weak.upgrade() else { break };
                hub.deliver_from(index, payload);
            }
            debug!(node = index, "hub pump stopped");
        });
        self.pumps.lock().push(pump);

        HubPort { index, outbox }
    }

    /// Sets where payloads for node `index` are delivered.
    pub fn attach(&self, index: usize, sink: PayloadSink) {
        if let Some(peer) = self.peers.write().get_mut(index) {
            peer.sink = Some(sink);
        }
    }

    pub fn detach(&self, index: usize) {
        if let Some(peer) = self.peers.write().get_mut(index) {
            peer.sink = None;
        }
    }

    pub fn set_filter(&self, filter: DeliveryFilter) {
        *self.filter.write() = Some(filter);
    }

    pub fn clear_filter(&self) {
        *self.filter.write() = None;
    }

    pub fn node_count(&self) -> usize {
        self.peers.read().len()
    }

    fn deliver_from(&self, from: usize, payload: ConsensusPayload) {
        let filter = self.filter.read().clone();
        let targets: Vec<(usize, PayloadSink)> = self
            .peers
            .read()
            .iter()
            .enumerate()
            .filter(|(to, _)| *to != from)
            .filter_map(|(to, peer)| peer.sink.clone().map(|sink| (to, sink)))
            .collect();

        for (to, sink) in targets {
            if let Some(filter) = &filter {
                if !filter(from, to, &payload) {
                    trace!(from, to, "payload filtered");
                    continue;
                }
            }
            sink(payload.clone());
        }
    }

    /// Closes every outbox and stops the pumps.
    pub fn shutdown(&self) {
        for peer in self.peers.read().iter() {
            peer.outbox.close();
        }
        for pump in self.pumps.lock().drain(..) {
            pump.abort();
        }
    }
}

impl Drop for LocalHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::tests::payload;
    use crate::ConsensusBroadcaster;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn recorder() -> (PayloadSink, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let sink: PayloadSink = Arc::new(move |p: ConsensusPayload| log.lock().push(p.height));
        (sink, seen)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn delivers_to_everyone_but_sender() {
        let hub = LocalHub::new(16);
        let ports: Vec<HubPort> = (0..3).map(|_| hub.add_node()).collect();
        let mut logs = Vec::new();
        for port in &ports {
            let (sink, seen) = recorder();
            hub.attach(port.index, sink);
            logs.push(seen);
        }

        ports[0].outbox.broadcast(payload(5));
        settle().await;

        assert!(logs[0].lock().is_empty());
        assert_eq!(*logs[1].lock(), vec![5]);
        assert_eq!(*logs[2].lock(), vec![5]);
    }

    #[tokio::test]
    async fn filter_models_partition() {
        let hub = LocalHub::new(16);
        let ports: Vec<HubPort> = (0..3).map(|_| hub.add_node()).collect();
        let mut logs = Vec::new();
        for port in &ports {
            let (sink, seen) = recorder();
            hub.attach(port.index, sink);
            logs.push(seen);
        }
        hub.set_filter(Arc::new(|_: usize, to: usize, _: &ConsensusPayload| to != 2));

        ports[1].outbox.broadcast(payload(9));
        settle().await;
        assert_eq!(*logs[0].lock(), vec![9]);
        assert!(logs[2].lock().is_empty());

        hub.clear_filter();
        ports[1].outbox.broadcast(payload(10));
        settle().await;
        assert_eq!(*logs[2].lock(), vec![10]);
    }

    #[tokio::test]
    async fn shutdown_closes_outboxes() {
        let hub = LocalHub::new(4);
        let port = hub.add_node();
        hub.shutdown();
        assert!(port.outbox.is_closed());
        assert!(!port.outbox.push(payload(1)));
    }
}
