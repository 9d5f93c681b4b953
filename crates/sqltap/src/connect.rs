//! Wiring: sink selection, optional queueing, session construction.
//!
//! `build_publisher` turns settings into the delivery stack — console by
//! default, Kafka when bootstrap servers are configured, with a
//! [`BatchingPublisher`] in front when queueing is enabled. The session
//! entry points compose the stack with a freshly connected driver.

use crate::config::Settings;
use crate::error::Result;
use crate::publish::{BatchingPublisher, EventPublisher};
use crate::sink::ConsoleSink;
use std::sync::Arc;

#[cfg(feature = "mysql")]
use crate::mysql::{MysqlConnectConfig, MysqlConnection};
#[cfg(feature = "mysql")]
use crate::session::CaptureSession;

/// Build the delivery stack the settings describe.
///
/// Kafka delivery requires the `kafka` feature; configuring bootstrap
/// servers without it is a configuration error.
pub async fn build_publisher(settings: &Settings) -> Result<Arc<dyn EventPublisher>> {
    let inner: Arc<dyn EventPublisher> = match settings.kafka_bootstrap_servers.as_deref() {
        Some(servers) => build_kafka_sink(servers, settings).await?,
        None => Arc::new(ConsoleSink::new()),
    };

    if settings.enable_queueing_publisher {
        Ok(Arc::new(BatchingPublisher::new(
            inner,
            settings.publisher_config(),
        )))
    } else {
        Ok(inner)
    }
}

#[cfg(feature = "kafka")]
async fn build_kafka_sink(
    servers: &str,
    settings: &Settings,
) -> Result<Arc<dyn EventPublisher>> {
    use crate::sink::{CompressionCodec, KafkaSink, KafkaSinkConfig};
    use tracing::warn;

    let compression = match settings.kafka_compression.trim().to_ascii_lowercase().as_str() {
        "" | "none" => CompressionCodec::None,
        "gzip" => CompressionCodec::Gzip,
        "lz4" => CompressionCodec::Lz4,
        "snappy" => CompressionCodec::Snappy,
        "zstd" => CompressionCodec::Zstd,
        other => {
            warn!("unknown kafka compression {other:?}, using none");
            CompressionCodec::None
        }
    };

    let config = KafkaSinkConfig {
        bootstrap_servers: servers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        topic: settings.kafka_topic.clone(),
        client_id: settings.kafka_client_id.clone(),
        partition: 0,
        compression,
        username: settings.kafka_username.clone(),
        password: settings.kafka_password.clone(),
    };

    Ok(Arc::new(KafkaSink::connect(&config).await?))
}

#[cfg(not(feature = "kafka"))]
async fn build_kafka_sink(
    _servers: &str,
    _settings: &Settings,
) -> Result<Arc<dyn EventPublisher>> {
    Err(crate::error::TapError::config(
        "kafka bootstrap servers configured but the `kafka` feature is not enabled",
    ))
}

/// Connect to MySQL and open a capture session over the connection, with
/// the delivery stack the settings describe.
#[cfg(feature = "mysql")]
pub async fn connect_mysql(
    config: &MysqlConnectConfig,
    settings: Settings,
) -> Result<CaptureSession<MysqlConnection>> {
    let publisher = build_publisher(&settings).await?;
    let conn = MysqlConnection::connect(config).await?;
    Ok(CaptureSession::open(conn, publisher, settings).await)
}
