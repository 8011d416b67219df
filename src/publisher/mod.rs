//! Outbound side of the bridge.
//!
//! The supervisor only sees the [`Publisher`] capability. The Kafka client is
//! the production variant; [`RecordingPublisher`] keeps everything in memory
//! for tests and [`LogPublisher`] backs `--dry-run`.

#[cfg(feature = "kafka")]
pub mod kafka;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::market_data::Envelope;
use crate::utils::error::{Error, Result};

#[cfg(feature = "kafka")]
pub use kafka::KafkaPublisher;

/// Publish one envelope and wait for the queue to acknowledge it.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()>;

    /// Deliver anything still buffered. Called once on shutdown.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()> {
        (**self).publish(envelope, key).await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Box<P> {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()> {
        (**self).publish(envelope, key).await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }
}

/// One accepted publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub key: String,
    pub envelope: Envelope,
}

/// In-memory publisher. Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    records: Arc<Mutex<Vec<PublishedRecord>>>,
    fail_after: Option<usize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` publishes, then reject every following one.
    pub fn failing_after(n: usize) -> Self {
        Self { records: Arc::default(), fail_after: Some(n) }
    }

    pub fn records(&self) -> Vec<PublishedRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PublishedRecord>> {
        // A panicking test thread must not hide what was recorded.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()> {
        let mut records = self.lock();
        if self.fail_after.is_some_and(|n| records.len() >= n) {
            return Err(Error::Publish(format!("injected failure after {} records", records.len())));
        }
        records.push(PublishedRecord { key: key.to_string(), envelope: envelope.clone() });
        Ok(())
    }
}

/// Logs what would be written instead of publishing.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self { topic: topic.into() }
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()> {
        let value = envelope.to_json()?;
        log::info!(
            "[dry-run] would write to {} key={} value={}",
            self.topic,
            key,
            String::from_utf8_lossy(&value)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::normalize;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn recording_publisher_keeps_order() {
        let publisher = RecordingPublisher::new();
        for env in normalize(br#"[{"S":"AAPL"},{"S":"MSFT"}]"#, "alpaca", "test", 5) {
            publisher.publish(&env, &env.partition_key()).await.unwrap();
        }
        let keys: Vec<_> = publisher.records().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn recording_publisher_injects_failure() {
        let publisher = RecordingPublisher::failing_after(1);
        let env = &normalize(br#"{"S":"AAPL"}"#, "alpaca", "test", 5)[0];
        assert!(publisher.publish(env, "AAPL").await.is_ok());
        assert_matches!(publisher.publish(env, "AAPL").await, Err(Error::Publish(_)));
        assert_eq!(publisher.len(), 1);
    }

    #[tokio::test]
    async fn shared_publisher_sees_same_records() {
        let publisher = Arc::new(RecordingPublisher::new());
        let env = &normalize(br#"{"symbol":"SPY"}"#, "alpaca", "test", 5)[0];
        publisher.publish(env, "SPY").await.unwrap();
        assert_eq!(publisher.records()[0].key, "SPY");
        assert!(LogPublisher::new("alpaca.marketdata").publish(env, "SPY").await.is_ok());
    }
}
