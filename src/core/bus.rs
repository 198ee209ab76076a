//! Message bus seam.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::BusError;

/// Inbound payloads for one subscribed topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    /// Wrap a receiver fed by a bus implementation.
    pub fn new(topic: impl Into<String>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    /// Subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload, or `None` once the bus drops the subscription.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// Publish/subscribe transport between the control plane and the fabrics.
///
/// Delivery is not guaranteed; a successful publish only means the bus
/// accepted the message.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to `topic`. Messages published after this returns are delivered.
    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}
