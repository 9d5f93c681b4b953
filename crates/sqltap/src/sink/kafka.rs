//! Kafka sink via rskafka.
//!
//! Each event becomes one JSON-valued record keyed by its connection id
//! (empty string when unknown), so records from one connection land on one
//! partition in order. Produce calls await broker acknowledgement, which
//! is what makes `flush` a no-op here. Delivery failures are logged and
//! swallowed — the capture path never sees them.

use crate::error::{Result, TapError};
use crate::publish::EventPublisher;
use async_trait::async_trait;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{ClientBuilder, SaslConfig};
use rskafka::record::Record;
use serde::{Deserialize, Serialize};
use sqltap_core::StatementEvent;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Compression codec for produced record batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// No compression
    #[default]
    None,
    /// gzip
    Gzip,
    /// LZ4
    Lz4,
    /// Snappy
    Snappy,
    /// zstd
    Zstd,
}

impl From<CompressionCodec> for Compression {
    fn from(codec: CompressionCodec) -> Self {
        match codec {
            CompressionCodec::None => Compression::NoCompression,
            CompressionCodec::Gzip => Compression::Gzip,
            CompressionCodec::Lz4 => Compression::Lz4,
            CompressionCodec::Snappy => Compression::Snappy,
            CompressionCodec::Zstd => Compression::Zstd,
        }
    }
}

/// Kafka sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSinkConfig {
    /// Bootstrap broker addresses, `host:port`.
    pub bootstrap_servers: Vec<String>,
    /// Destination topic.
    pub topic: String,
    /// Client id presented to the brokers.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Partition produced to. Keyed ordering only holds within one
    /// partition.
    #[serde(default)]
    pub partition: i32,
    /// Record batch compression.
    #[serde(default)]
    pub compression: CompressionCodec,
    /// SASL PLAIN username; SASL is enabled when both username and
    /// password are set.
    #[serde(default)]
    pub username: Option<String>,
    /// SASL PLAIN password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_client_id() -> String {
    "sqltap".to_string()
}

impl KafkaSinkConfig {
    /// Minimal configuration for a broker list and topic.
    pub fn new(bootstrap_servers: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            bootstrap_servers,
            topic: topic.into(),
            client_id: default_client_id(),
            partition: 0,
            compression: CompressionCodec::default(),
            username: None,
            password: None,
        }
    }
}

/// Produces events to one Kafka topic partition.
pub struct KafkaSink {
    partition_client: PartitionClient,
    topic: String,
    compression: CompressionCodec,
}

impl KafkaSink {
    /// Connect to the brokers and bind the topic partition.
    pub async fn connect(config: &KafkaSinkConfig) -> Result<Self> {
        if config.bootstrap_servers.is_empty() {
            return Err(TapError::config("kafka bootstrap servers are empty"));
        }

        let mut builder = ClientBuilder::new(config.bootstrap_servers.clone());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.sasl_config(SaslConfig::Plain {
                username: username.clone(),
                password: password.clone(),
            });
        }

        let client = builder
            .build()
            .await
            .map_err(|e| TapError::sink(format!("failed to create Kafka client: {e}")))?;

        let partition_client = client
            .partition_client(&config.topic, config.partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| {
                TapError::sink(format!(
                    "failed to bind topic {} partition {}: {e}",
                    config.topic, config.partition
                ))
            })?;

        info!(
            "kafka sink connected, topic {} partition {}",
            config.topic, config.partition
        );

        Ok(Self {
            partition_client,
            topic: config.topic.clone(),
            compression: config.compression,
        })
    }

    fn to_record(event: &StatementEvent) -> Record {
        let key = event
            .connection_id
            .map(|id| id.to_string())
            .unwrap_or_default()
            .into_bytes();
        let value = serde_json::to_vec(event).unwrap_or_default();

        Record {
            key: Some(key),
            value: Some(value),
            headers: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    async fn produce(&self, records: Vec<Record>) {
        let count = records.len();
        match self
            .partition_client
            .produce(records, self.compression.into())
            .await
        {
            Ok(offsets) => {
                debug!(
                    "produced {count} records to {} (first offset {:?})",
                    self.topic,
                    offsets.first()
                );
            }
            Err(e) => {
                error!("failed to produce {count} records to {}: {e}", self.topic);
            }
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaSink {
    async fn publish(&self, event: StatementEvent) -> Result<()> {
        self.produce(vec![Self::to_record(&event)]).await;
        Ok(())
    }

    async fn publish_batch(&self, events: Vec<StatementEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let records = events.iter().map(Self::to_record).collect();
        self.produce(records).await;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // produce() awaits broker acknowledgement; nothing is in flight
        // once publish returns.
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
