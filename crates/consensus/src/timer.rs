// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

use std::time::Duration;

use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::messages::ViewNumber;
use crate::service::Event;

#[derive(Debug, Copy, Clone, Default, Hash, Eq, PartialEq)]
pub struct HView {
    /// The height being decided
    pub height: u32,

    /// The view within that height
    pub view_number: ViewNumber,
}

impl HView {
    #[inline]
    pub fn new(height: u32, view_number: ViewNumber) -> Self {
        Self { height, view_number }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timer {
    pub view: HView,
    pub delay: Duration,
}

/// One-shot timer delivering [`Event::Timeout`] to the service loop.
///
/// Arming always cancels the outstanding timer. Fires carry the
/// [`HView`] they were armed for so the loop can discard stale ones.
pub struct ViewTimer {
    tx: WeakUnboundedSender<Event>,
    armed: Option<Timer>,
    task: Option<JoinHandle<()>>,
}

impl ViewTimer {
    pub fn new(tx: WeakUnboundedSender<Event>) -> Self {
        Self { tx, armed: None, task: None }
    }

    pub fn reset_timeout(&mut self, view: HView, delay: Duration) {
        self.cancel();
        trace!(height = view.height, view = view.view_number, ?delay, "timer armed");

        let tx = self.tx.clone();
        self.armed = Some(Timer { view, delay });
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Event::Timeout(view));
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.armed = None;
    }

    #[inline]
    pub fn armed(&self) -> Option<Timer> {
        self.armed
    }
}

impl Drop for ViewTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// `per_block << (view + 1)`, saturating for large views.
#[inline]
pub fn delay_on_view(view_number: ViewNumber, per_block: Duration) -> Duration {
    let shift = core::cmp::min(32, u32::from(view_number) + 1);
    let millis = u64::try_from(per_block.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(millis.saturating_mul(1u64 << shift))
}

/// What remains of `per_block` since the last block was persisted.
#[inline]
pub fn delay_on_primary(per_block: Duration, elapsed: Option<Duration>) -> Duration {
    match elapsed {
        Some(elapsed) => per_block.saturating_sub(elapsed),
        None => Duration::ZERO,
    }
}
