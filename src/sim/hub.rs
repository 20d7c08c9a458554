//! Frame fan-out
//!
//! One source of truth for both transports: push subscribers get every frame
//! over a bounded per-subscriber channel, pull consumers read the latest
//! frame slot. Transport choice is a client concern.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::models::Frame;

/// A live push subscription. Dropping the subscription closes the channel;
/// the hub removes the entry on the next publish.
pub struct PushSubscription {
    pub id: Uuid,
    rx: mpsc::Receiver<Arc<Frame>>,
}

impl PushSubscription {
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        self.rx.recv().await
    }
}

struct PushSlot {
    tx: mpsc::Sender<Arc<Frame>>,
    /// Consecutive publishes this subscriber's queue was full for
    lagged: u32,
}

pub struct BroadcastHub {
    subscribers: RwLock<HashMap<Uuid, PushSlot>>,
    latest: RwLock<Option<Arc<Frame>>>,
    capacity: usize,
    max_lag: u32,
}

impl BroadcastHub {
    pub fn new(capacity: usize, max_lag: u32) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            latest: RwLock::new(None),
            capacity: capacity.max(1),
            max_lag,
        }
    }

    /// Register a push endpoint. A late joiner is offered exactly the most
    /// recent frame, not full history.
    pub fn subscribe_push(&self) -> PushSubscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Some(frame) = self.latest.read().clone() {
            // Fresh channel with capacity >= 1, cannot fail
            let _ = tx.try_send(frame);
        }

        let id = Uuid::new_v4();
        self.subscribers.write().insert(id, PushSlot { tx, lagged: 0 });
        tracing::debug!(subscriber = %id, "push subscriber registered");
        PushSubscription { id, rx }
    }

    /// Remove a subscriber. Idempotent; unknown handles are a no-op.
    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "push subscriber removed");
        }
    }

    /// Send `frame` to every live push subscriber and update the latest-frame
    /// slot. Sends are non-blocking: a full queue never stalls delivery to
    /// the others. A subscriber full for more than `max_lag` consecutive
    /// publishes is dropped; a closed channel is removed immediately.
    pub fn publish(&self, frame: Frame) {
        let frame = Arc::new(frame);
        *self.latest.write() = Some(Arc::clone(&frame));

        let max_lag = self.max_lag;
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|id, slot| match slot.tx.try_send(Arc::clone(&frame)) {
            Ok(()) => {
                slot.lagged = 0;
                true
            }
            Err(TrySendError::Full(_)) => {
                slot.lagged += 1;
                if slot.lagged > max_lag {
                    tracing::warn!(
                        subscriber = %id,
                        lagged = slot.lagged,
                        "dropping slow push subscriber"
                    );
                    false
                } else {
                    true
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %id, "push subscriber gone");
                false
            }
        });
    }

    /// Non-blocking read of the most recent frame, for pull/poll consumers.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
