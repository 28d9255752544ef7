//! NetworkSink - UDP fire-and-forget streaming

use contracts::{ContractError, DataSink, PublishBatch};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

use crate::encoding::PayloadFormat;

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: PayloadFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = PayloadFormat::from_params(params, PayloadFormat::Json)?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", s, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends one datagram per batch over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    /// Create a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, batch: &PublishBatch) -> Result<Vec<u8>, ContractError> {
        let data = self
            .config
            .format
            .encode(batch)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Batch exceeds datagram size, not sent"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "payload of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], cycle_id: u64) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, cycle_id, bytes = sent, "Sent");
            }
            Err(e) => {
                // UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, batch),
        fields(sink = %self.name, cycle_id = batch.cycle_id)
    )]
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(batch)?;
        self.transmit(socket, &data, batch.cycle_id).await;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
