//! Controller connector abstraction
//!
//! Defines how worker connections are opened, supporting real drivers and the simulator.

use std::future::Future;

use contracts::TagReader;

use crate::error::Result;

/// Controller connector trait
///
/// Opens one exclusive connection per worker. Connections are long-lived:
/// they are opened once at startup and released at shutdown.
pub trait Connector: Send + Sync {
    /// Connection type handed to a worker
    type Reader: TagReader + 'static;

    /// Controller endpoint (for logging)
    fn endpoint(&self) -> String;

    /// Open the connection for one worker
    ///
    /// # Arguments
    /// * `worker_index` - Index of the worker (shard) that will own the connection
    fn open(&self, worker_index: usize) -> impl Future<Output = Result<Self::Reader>> + Send;
}
