//! In-process message bus.
//!
//! Topic-routed fan-out over unbounded channels. Published messages are also
//! kept in a bounded log so tests and operators can inspect what was sent.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::{BusError, MessageBus, Subscription};
use crate::util::clock::now_ms;

/// Published messages kept by default.
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// A message accepted by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Acceptance time (ms since epoch).
    pub published_at_ms: u128,
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    log: VecDeque<PublishedMessage>,
    closed: bool,
}

/// In-memory bus for development and testing.
pub struct InMemoryMessageBus {
    state: Mutex<BusState>,
    log_capacity: usize,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl InMemoryMessageBus {
    /// Create an open bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that keeps at most `log_capacity` published messages.
    #[must_use]
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            log_capacity,
        }
    }

    /// Close the bus. Further publishes and subscribes fail, and existing
    /// subscriptions end.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    /// Messages published on `topic`, oldest first.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Every published message, oldest first.
    #[must_use]
    pub fn all_published(&self) -> Vec<PublishedMessage> {
        self.state.lock().log.iter().cloned().collect()
    }

    /// Live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        if let Some(subs) = state.subscribers.get_mut(topic) {
            subs.retain(|tx| tx.send(payload.clone()).is_ok());
        }
        tracing::trace!("published {} bytes on {}", payload.len(), topic);
        if self.log_capacity > 0 {
            if state.log.len() >= self.log_capacity {
                state.log.pop_front();
            }
            state.log.push_back(PublishedMessage {
                topic: topic.to_string(),
                payload,
                published_at_ms: now_ms(),
            });
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.entry(topic.to_string()).or_default().push(tx);
        Ok(Subscription::new(topic, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_per_topic() {
        let bus = InMemoryMessageBus::new();
        let mut a = bus.subscribe("a").unwrap();
        let mut a2 = bus.subscribe("a").unwrap();
        let _b = bus.subscribe("b").unwrap();

        bus.publish("a", b"hello".to_vec()).await.unwrap();

        assert_eq!(a.next().await.unwrap(), b"hello".to_vec());
        assert_eq!(a2.next().await.unwrap(), b"hello".to_vec());
        assert_eq!(bus.published("a").len(), 1);
        assert!(bus.published("b").is_empty());
    }

    #[tokio::test]
    async fn test_closed_bus_rejects() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe("a").unwrap();
        bus.close();

        assert_eq!(bus.publish("a", vec![1]).await, Err(BusError::Closed));
        assert!(bus.subscribe("a").is_err());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_log_is_bounded() {
        let bus = InMemoryMessageBus::with_log_capacity(2);
        for i in 0..5u8 {
            bus.publish("a", vec![i]).await.unwrap();
        }

        let log = bus.all_published();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].payload, vec![3]);
        assert_eq!(log[1].payload, vec![4]);
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned() {
        let bus = InMemoryMessageBus::new();
        let sub = bus.subscribe("a").unwrap();
        assert_eq!(bus.subscriber_count("a"), 1);
        drop(sub);
        bus.publish("a", vec![1]).await.unwrap();
        assert_eq!(bus.subscriber_count("a"), 0);
    }
}
