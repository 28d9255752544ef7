//! NatsSink - publishes batches to a NATS message bus

use bytes::Bytes;
use contracts::{ContractError, DataSink, PayloadChannel, PublishBatch};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::encoding::PayloadFormat;

const DEFAULT_URL: &str = "nats://127.0.0.1:4222";
const DEFAULT_SUBJECT_FULL: &str = "ab_all";
const DEFAULT_SUBJECT_CHANGED: &str = "ab_changed";

/// Configuration for NatsSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsSinkConfig {
    /// Server URL
    pub url: String,
    /// Subject for the full view
    pub subject_full: String,
    /// Subject for the changed view
    pub subject_changed: String,
    /// Message encoding
    pub format: PayloadFormat,
    /// Publish empty batches too
    pub publish_empty: bool,
}

impl NatsSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let get = |key: &str, default: &str| {
            params
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let publish_empty = match params.get("publish_empty").map(String::as_str) {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => return Err(format!("invalid publish_empty '{}'", other)),
        };

        Ok(Self {
            url: get("url", DEFAULT_URL),
            subject_full: get("subject_full", DEFAULT_SUBJECT_FULL),
            subject_changed: get("subject_changed", DEFAULT_SUBJECT_CHANGED),
            format: PayloadFormat::from_params(params, PayloadFormat::Lines)?,
            publish_empty,
        })
    }

    pub fn subject(&self, channel: PayloadChannel) -> &str {
        match channel {
            PayloadChannel::Full => &self.subject_full,
            PayloadChannel::Changed => &self.subject_changed,
        }
    }
}

/// Sink that publishes every batch as one NATS message
pub struct NatsSink {
    name: String,
    config: NatsSinkConfig,
    client: Option<async_nats::Client>,
}

impl NatsSink {
    /// Connect to the server
    #[instrument(name = "nats_sink_connect", skip(name, config), fields(url = %config.url))]
    pub async fn connect(name: impl Into<String>, config: NatsSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        info!(
            sink = %name,
            url = %config.url,
            subject_full = %config.subject_full,
            subject_changed = %config.subject_changed,
            "NatsSink connected"
        );

        Ok(Self {
            name,
            config,
            client: Some(client),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NatsSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;
        Self::connect(name, config).await
    }

    fn client(&self) -> Result<&async_nats::Client, ContractError> {
        self.client
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "client closed"))
    }
}

impl DataSink for NatsSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "nats_sink_write",
        skip(self, batch),
        fields(sink = %self.name, cycle_id = batch.cycle_id, channel = %batch.channel)
    )]
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError> {
        if batch.readings.is_empty() && !self.config.publish_empty {
            return Ok(());
        }

        let payload = self
            .config
            .format
            .encode(batch)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;
        let subject = self.config.subject(batch.channel).to_string();

        self.client()?
            .publish(subject, Bytes::from(payload))
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "nats_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(client) = &self.client {
            client
                .flush()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "nats_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.client = None;
        debug!(sink = %self.name, "NatsSink closed");
        Ok(())
    }
}
