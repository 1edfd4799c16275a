//! Message-bus boundary.
//!
//! The generator publishes through [`BusPublisher`] and never sees the broker
//! transport. [`MemoryBus`] is the in-process backend used by the server and
//! by tests; a broker client plugs in by implementing the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::error::PublishError;
use crate::types::VehicleEnvelope;

/// Publish side of a message broker.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        event_name: &str,
        envelope: &VehicleEnvelope,
    ) -> Result<(), PublishError>;
}

/// One message as seen by a topic subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    pub topic: String,
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// In-process topic bus backed by one broadcast channel per topic.
///
/// Publishing to a topic nobody listens to succeeds and the message is lost.
#[derive(Clone)]
pub struct MemoryBus {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<BusMessage>>>>,
    capacity: usize,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to `topic`, creating it if needed.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.channel(topic).await.subscribe()
    }

    async fn channel(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        {
            let topics = self.topics.read().await;
            if let Some(tx) = topics.get(topic) {
                return tx.clone();
            }
        }
        let mut topics = self.topics.write().await;
        // Another writer may have created it between the two locks
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl BusPublisher for MemoryBus {
    async fn publish(
        &self,
        topic: &str,
        event_name: &str,
        envelope: &VehicleEnvelope,
    ) -> Result<(), PublishError> {
        let message = BusMessage {
            topic: topic.to_string(),
            event_name: event_name.to_string(),
            payload: serde_json::to_value(envelope)?,
        };
        let delivered = self.channel(topic).await.send(message).unwrap_or(0);
        tracing::trace!(topic, delivered, "bus message published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::RecordFactory;

    #[tokio::test]
    async fn test_subscriber_receives_message() {
        let bus = MemoryBus::new(16);
        let mut rx = bus.subscribe("fleet/a").await;
        let envelope = RecordFactory::seeded(3).next_envelope();

        bus.publish("fleet/a", "VehicleGenerated", &envelope)
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(message.topic, "fleet/a");
        assert_eq!(message.event_name, "VehicleGenerated");
        assert_eq!(message.payload["identifier"], envelope.identifier.as_str());
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = MemoryBus::new(16);
        let mut other = bus.subscribe("fleet/b").await;
        let envelope = RecordFactory::seeded(4).next_envelope();

        bus.publish("fleet/a", "VehicleGenerated", &envelope)
            .await
            .unwrap();

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let bus = MemoryBus::default();
        let envelope = RecordFactory::seeded(5).next_envelope();
        assert!(bus
            .publish("nobody/listens", "VehicleGenerated", &envelope)
            .await
            .is_ok());
    }
}
