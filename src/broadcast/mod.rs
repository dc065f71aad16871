//! Subscriber fan-out
//!
//! [`SubscriberRegistry`] tracks live subscribers; [`Broadcaster`] pushes
//! snapshots to all of them, isolating per-subscriber failures.

mod publisher;
mod registry;

pub use publisher::{Broadcaster, PublishReport};
pub use registry::SubscriberRegistry;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Registry-assigned subscriber identifier
pub type SubscriberId = Uuid;

/// Subscriber delivery errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The peer closed the connection
    #[error("Subscriber connection closed")]
    Closed,
    /// Writing to the transport failed
    #[error("Write failed: {0}")]
    Write(String),
    /// The send did not complete in time
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

/// A live connection that accepts pushed payloads
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Push one encoded snapshot to the peer
    async fn send(&self, payload: &str) -> Result<(), DeliveryError>;

    /// Called once after the broadcaster removed this subscriber because a
    /// send failed. Transports release their connection here.
    fn close(&self) {}
}

/// One encoded snapshot, tagged with the broadcast epoch it belongs to
///
/// Epochs only grow; subscribers drop frames older than the newest one they
/// have already received.
#[derive(Debug, Clone)]
pub struct Frame {
    pub epoch: u64,
    pub payload: Arc<str>,
}

impl Frame {
    pub fn new(epoch: u64, payload: impl Into<Arc<str>>) -> Self {
        Self {
            epoch,
            payload: payload.into(),
        }
    }
}
