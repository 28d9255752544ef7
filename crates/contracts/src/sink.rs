//! DataSink / CyclePublisher traits - poller output interfaces
//!
//! `CyclePublisher` is what the scheduler sees: one non-blocking call per
//! completed cycle. `DataSink` is a single downstream consumer driven by the
//! dispatcher on its own task.

use crate::{ContractError, PolledCycle, PublishBatch};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one payload view of one cycle
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Receiver of completed cycles
///
/// Fire-and-forget: implementations must return promptly and must never fail
/// the polling loop. Failures are logged/counted on the implementation side.
pub trait CyclePublisher: Send {
    fn publish(&mut self, cycle: &PolledCycle);
}

impl CyclePublisher for Vec<PolledCycle> {
    fn publish(&mut self, cycle: &PolledCycle) {
        self.push(cycle.clone());
    }
}
