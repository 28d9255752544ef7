//! FileSink - appends encoded batches to one file per channel

use contracts::{ContractError, DataSink, PayloadChannel, PublishBatch};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

use crate::encoding::PayloadFormat;

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Encoding of each batch
    pub format: PayloadFormat,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let format = PayloadFormat::from_params(params, PayloadFormat::Lines)?;
        if format == PayloadFormat::Bincode {
            return Err("bincode is not supported by the file sink".to_string());
        }

        Ok(Self { base_path, format })
    }
}

/// Sink that appends batches to `<base_path>/<channel>.log`
///
/// JSON batches are written one per line.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    files: HashMap<PayloadChannel, BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            files: HashMap::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;
        Ok(Self::new(name, config)?)
    }

    /// File path of a channel
    pub fn path_for(&self, channel: PayloadChannel) -> PathBuf {
        self.config.base_path.join(format!("{}.log", channel))
    }

    fn writer(&mut self, channel: PayloadChannel) -> std::io::Result<&mut BufWriter<File>> {
        let path = self.path_for(channel);
        match self.files.entry(channel) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(entry.insert(BufWriter::new(file)))
            }
        }
    }

    fn append(&mut self, batch: &PublishBatch) -> std::io::Result<()> {
        if batch.readings.is_empty() {
            return Ok(());
        }

        let mut data = self
            .config
            .format
            .encode(batch)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if self.config.format == PayloadFormat::Json {
            data.push(b'\n');
        }

        self.writer(batch.channel)?.write_all(&data)
    }

    fn flush_all(&mut self) -> std::io::Result<()> {
        for writer in self.files.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, batch),
        fields(sink = %self.name, cycle_id = batch.cycle_id)
    )]
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError> {
        self.append(batch).map_err(|e| {
            error!(sink = %self.name, cycle_id = batch.cycle_id, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush_all()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        self.files.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{TagReading, TagValue};
    use tempfile::tempdir;

    fn batch(channel: PayloadChannel, cycle_id: u64, readings: &[(&str, i64)]) -> PublishBatch {
        PublishBatch {
            channel,
            cycle_id,
            timestamp_ms: cycle_id * 1000,
            readings: readings
                .iter()
                .map(|(tag, v)| TagReading {
                    address: (*tag).into(),
                    value: TagValue::Int(*v),
                    timestamp_ms: cycle_id * 1000,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let config = FileSinkConfig {
            base_path: dir.path().to_path_buf(),
            format: PayloadFormat::Lines,
        };

        let mut sink = FileSink::new("test_file", config).unwrap();
        sink.write(&batch(PayloadChannel::Changed, 1, &[("A", 1), ("B", 2)]))
            .await
            .unwrap();
        sink.write(&batch(PayloadChannel::Changed, 2, &[("B", 5)]))
            .await
            .unwrap();
        sink.write(&batch(PayloadChannel::Full, 2, &[])).await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(dir.path().join("changed.log")).unwrap();
        assert_eq!(content, "A, 1000, 1\r\nB, 1000, 2\r\nB, 2000, 5\r\n");
        assert!(!dir.path().join("full.log").exists());
    }

    #[tokio::test]
    async fn test_file_sink_json_lines() {
        let dir = tempdir().unwrap();
        let mut params = HashMap::new();
        params.insert(
            "base_path".to_string(),
            dir.path().to_string_lossy().to_string(),
        );
        params.insert("format".to_string(), "json".to_string());

        let mut sink = FileSink::from_params("json_file", &params).unwrap();
        sink.write(&batch(PayloadChannel::Full, 1, &[("A", 1)]))
            .await
            .unwrap();
        sink.write(&batch(PayloadChannel::Full, 2, &[("A", 1)]))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let content = fs::read_to_string(sink.path_for(PayloadChannel::Full)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["cycle_id"], 2);
    }

    #[test]
    fn test_rejects_bincode() {
        let mut params = HashMap::new();
        params.insert("format".to_string(), "bincode".to_string());
        assert!(FileSinkConfig::from_params(&params).is_err());
    }
}
