//! Subscriber registry

use super::{DeliveryError, Frame, Subscriber, SubscriberId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Registered subscriber plus the epoch of the last frame it received
pub(crate) struct Slot {
    subscriber: Arc<dyn Subscriber>,
    last_epoch: Mutex<Option<u64>>,
}

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    /// Frame was older than one already delivered
    Stale,
}

impl Slot {
    fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            subscriber,
            last_epoch: Mutex::new(None),
        }
    }

    /// Send a frame unless a newer one already went out
    ///
    /// The epoch lock is held across the send so pushes to one subscriber
    /// never interleave.
    pub(crate) async fn deliver(&self, frame: &Frame) -> Result<Delivery, DeliveryError> {
        let mut last = self.last_epoch.lock().await;
        if last.is_some_and(|epoch| frame.epoch < epoch) {
            return Ok(Delivery::Stale);
        }

        self.subscriber.send(&frame.payload).await?;
        *last = Some(frame.epoch);
        Ok(Delivery::Sent)
    }

    /// Tell the subscriber it has been dropped
    pub(crate) fn close(&self) {
        self.subscriber.close();
    }
}

/// Tracks currently connected subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    slots: RwLock<HashMap<SubscriberId, Arc<Slot>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber under a fresh id
    pub(crate) async fn insert(&self, subscriber: Arc<dyn Subscriber>) -> (SubscriberId, Arc<Slot>) {
        let id = Uuid::new_v4();
        let slot = Arc::new(Slot::new(subscriber));
        self.slots.write().await.insert(id, slot.clone());
        (id, slot)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        self.slots.write().await.remove(&id).is_some()
    }

    /// Remove several subscribers under one lock. Returns how many were present.
    pub async fn remove_all(&self, ids: &[SubscriberId]) -> usize {
        let mut slots = self.slots.write().await;
        ids.iter().filter(|id| slots.remove(*id).is_some()).count()
    }

    /// Stable copy of the current set, safe to iterate while the registry changes
    pub(crate) async fn snapshot(&self) -> Vec<(SubscriberId, Arc<Slot>)> {
        self.slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect()
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.slots.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}
