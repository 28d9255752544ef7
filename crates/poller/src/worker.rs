//! Worker: batched reads and change detection for one shard.
//!
//! Each worker owns its shard and its controller connection for the process
//! lifetime and lives on its own task, woken once per cycle by a
//! [`PollRequest`] and answering on a one-shot channel.

use std::time::Duration;

use contracts::{ContractError, TagRead, TagReader, TagReading};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::partition::Shard;
use crate::store::StoreShard;

/// One worker's share of a cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerFragment {
    pub shard_index: usize,
    pub full: Vec<TagReading>,
    pub changed: Vec<TagReading>,
    /// Addresses that failed individually
    pub read_failures: u32,
    /// Set when the whole shard was lost to a connection-level error
    pub connection_error: Option<String>,
}

impl WorkerFragment {
    pub fn empty(shard_index: usize) -> Self {
        Self {
            shard_index,
            ..Default::default()
        }
    }

    /// Zero readings because the connection failed
    pub fn connection_failed(shard_index: usize, reason: impl Into<String>) -> Self {
        Self {
            shard_index,
            connection_error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_connection_failure(&self) -> bool {
        self.connection_error.is_some()
    }
}

/// Classify one cycle's reads against the previous cycle's values.
///
/// Readings are checked and stored in shard order, so an address listed
/// twice is compared against its first occurrence on the second read.
pub fn classify(
    shard_index: usize,
    reads: Vec<TagRead>,
    timestamp_ms: u64,
    store: &mut StoreShard,
) -> WorkerFragment {
    let mut fragment = WorkerFragment::empty(shard_index);
    fragment.full.reserve(reads.len());

    for read in reads {
        let value = match read.outcome {
            Ok(value) => value,
            Err(failure) => {
                debug!(shard = shard_index, error = %failure, "address read failed");
                fragment.read_failures += 1;
                continue;
            }
        };

        let reading = TagReading {
            address: read.address,
            value,
            timestamp_ms,
        };

        if store.get(&reading.address) != Some(&reading.value) {
            fragment.changed.push(reading.clone());
        }
        store.set(reading.address.clone(), reading.value.clone());
        fragment.full.push(reading);
    }

    fragment
}

/// Shard reader bound to one controller connection
pub struct Worker<R> {
    shard: Shard,
    /// `None` when the connection could not be opened at startup
    reader: Option<R>,
    batch_size: usize,
    read_timeout: Option<Duration>,
}

impl<R: TagReader> Worker<R> {
    pub fn new(
        shard: Shard,
        reader: Option<R>,
        batch_size: usize,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            shard,
            reader,
            batch_size: batch_size.max(1),
            read_timeout,
        }
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Poll the shard once.
    ///
    /// All batches are read before the store is touched: a connection error
    /// on any batch yields an empty fragment and leaves `store` as it was.
    #[instrument(
        level = "debug",
        name = "worker_poll",
        skip(self, store),
        fields(shard = self.shard.index, tags = self.shard.len())
    )]
    pub async fn poll(&mut self, timestamp_ms: u64, store: &mut StoreShard) -> WorkerFragment {
        if self.shard.is_empty() {
            return WorkerFragment::empty(self.shard.index);
        }

        match self.read_all().await {
            Ok(reads) => classify(self.shard.index, reads, timestamp_ms, store),
            Err(e) => {
                warn!(shard = self.shard.index, error = %e, "shard read failed, cycle degraded");
                WorkerFragment::connection_failed(self.shard.index, e.to_string())
            }
        }
    }

    async fn read_all(&mut self) -> Result<Vec<TagRead>, ContractError> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            ContractError::controller_connection(
                format!("worker-{}", self.shard.index),
                "connection was not opened",
            )
        })?;

        let mut reads = Vec::with_capacity(self.shard.len());
        for batch in self.shard.addresses.chunks(self.batch_size) {
            let outcome = match self.read_timeout {
                Some(limit) => match tokio::time::timeout(limit, reader.read_batch(batch)).await {
                    Ok(result) => result,
                    Err(_) => Err(ContractError::ReadTimeout {
                        connection: reader.connection_id().to_string(),
                        waited_ms: limit.as_millis() as u64,
                    }),
                },
                None => reader.read_batch(batch).await,
            };
            reads.extend(outcome?);
        }

        Ok(reads)
    }

    /// Release the connection
    pub async fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            let connection = reader.connection_id().to_string();
            match reader.close().await {
                Ok(()) => debug!(connection = %connection, "controller connection released"),
                Err(e) => warn!(connection = %connection, error = %e, "failed to close connection"),
            }
        }
    }
}

/// Work order for one cycle; carries the worker's store partition
pub(crate) struct PollRequest {
    pub timestamp_ms: u64,
    pub store: StoreShard,
    pub reply: oneshot::Sender<WorkerReply>,
}

/// Fragment plus the store partition handed back to the scheduler
pub(crate) struct WorkerReply {
    pub fragment: WorkerFragment,
    pub store: StoreShard,
}

/// Outcome of handing a request to a worker task
pub(crate) enum Dispatch {
    Sent(oneshot::Receiver<WorkerReply>),
    /// The task is gone; the partition comes straight back
    Unavailable(StoreShard),
}

/// Scheduler-side handle of a persistent worker task
pub(crate) struct WorkerHandle {
    index: usize,
    tx: mpsc::Sender<PollRequest>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn spawn<R>(worker: Worker<R>) -> Self
    where
        R: TagReader + 'static,
    {
        let index = worker.shard().index;
        let (tx, rx) = mpsc::channel(1);
        let join = tokio::spawn(worker_loop(worker, rx));
        Self { index, tx, join }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub async fn dispatch(&self, timestamp_ms: u64, store: StoreShard) -> Dispatch {
        let (reply, rx) = oneshot::channel();
        let request = PollRequest {
            timestamp_ms,
            store,
            reply,
        };
        match self.tx.send(request).await {
            Ok(()) => Dispatch::Sent(rx),
            Err(mpsc::error::SendError(request)) => Dispatch::Unavailable(request.store),
        }
    }

    /// Close the request channel and wait for the task to release its connection
    pub async fn stop(self) {
        drop(self.tx);
        if let Err(e) = self.join.await {
            warn!(worker = self.index, error = %e, "worker task ended abnormally");
        }
    }
}

async fn worker_loop<R: TagReader>(mut worker: Worker<R>, mut rx: mpsc::Receiver<PollRequest>) {
    while let Some(PollRequest {
        timestamp_ms,
        mut store,
        reply,
    }) = rx.recv().await
    {
        let fragment = worker.poll(timestamp_ms, &mut store).await;
        if reply.send(WorkerReply { fragment, store }).is_err() {
            debug!(worker = worker.shard().index, "scheduler went away before the reply");
        }
    }

    worker.close().await;
}
