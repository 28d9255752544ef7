//! LogSink - logs batch summaries via tracing

use contracts::{ContractError, DataSink, PublishBatch};
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
    /// Also log every reading at debug level
    verbose: bool,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn log_batch(&self, batch: &PublishBatch) {
        info!(
            sink = %self.name,
            channel = %batch.channel,
            cycle_id = batch.cycle_id,
            timestamp_ms = batch.timestamp_ms,
            readings = batch.readings.len(),
            "Batch received"
        );

        if self.verbose {
            for reading in &batch.readings {
                debug!(
                    sink = %self.name,
                    address = %reading.address,
                    value = %reading.value,
                    "reading"
                );
            }
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, cycle_id = batch.cycle_id)
    )]
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError> {
        self.log_batch(batch);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
