//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, PayloadChannel, PublishBatch};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channels this sink receives
    channels: Vec<PayloadChannel>,
    /// Queue to the worker; batches are shared between sinks
    tx: mpsc::Sender<Arc<PublishBatch>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker subscribed to every channel
    pub fn spawn<S: DataSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::with_channels(sink, queue_capacity, PayloadChannel::ALL.to_vec())
    }

    /// Spawn a worker subscribed to `channels`
    pub fn with_channels<S: DataSink + 'static>(
        sink: S,
        queue_capacity: usize,
        channels: Vec<PayloadChannel>,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            channels,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &[PayloadChannel] {
        &self.channels
    }

    pub fn subscribes(&self, channel: PayloadChannel) -> bool {
        self.channels.contains(&channel)
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a batch for the sink (non-blocking)
    ///
    /// Returns true if queued, false if the queue was full (batch dropped)
    pub fn try_send(&self, batch: Arc<PublishBatch>) -> bool {
        match self.tx.try_send(batch) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(b)) => {
                self.metrics.record_dropped(&self.name);
                warn!(
                    sink = %self.name,
                    cycle_id = b.cycle_id,
                    channel = %b.channel,
                    "Queue full, batch dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Queued batches are still written, then the sink is flushed and closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes batches and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<PublishBatch>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(batch) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&batch).await {
            Ok(()) => metrics.record_write(&name, batch.channel, true),
            Err(e) => {
                metrics.record_write(&name, batch.channel, false);
                error!(
                    sink = %name,
                    cycle_id = batch.cycle_id,
                    channel = %batch.channel,
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
