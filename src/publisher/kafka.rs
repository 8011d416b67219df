//! Kafka publisher built on librdkafka.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use super::Publisher;
use crate::config::KafkaConfig;
use crate::market_data::Envelope;
use crate::utils::error::{Error, Result};

/// Synchronous, all-replica-acked producer for one topic.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", "all")
            // CRC32 of the key; equal keys always land on the same partition.
            .set("partitioner", "consistent")
            .set("linger.ms", config.linger_ms.to_string())
            .set("message.timeout.ms", config.delivery_timeout_ms.to_string())
            .create()
            .map_err(|e| Error::Config(format!("kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            delivery_timeout: Duration::from_millis(config.delivery_timeout_ms),
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, envelope: &Envelope, key: &str) -> Result<()> {
        let value = envelope.to_json()?;
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .payload(&value)
            .timestamp(chrono::Utc::now().timestamp_millis());

        match self.producer.send(record, Timeout::After(self.delivery_timeout)).await {
            | Ok((partition, offset)) => {
                log::trace!("kafka ack key={} partition={} offset={}", key, partition, offset);
                Ok(())
            }
            | Err((e, _)) => Err(Error::Publish(format!("kafka write failed: {}", e))),
        }
    }

    async fn flush(&self) -> Result<()> {
        self.producer
            .flush(Timeout::After(self.delivery_timeout))
            .map_err(|e| Error::Publish(format!("kafka flush failed: {}", e)))
    }
}
