//! # Poller
//!
//! Cyclic concurrent tag polling engine.
//!
//! ## Components
//!
//! - [`partition`]: static split of the address list into worker shards
//! - [`Worker`]: batched reads of one shard and change detection
//! - [`LastValueStore`]: last observed value per tag, one partition per worker
//! - [`aggregate`]: fan-in of worker fragments in shard order
//! - [`CycleScheduler`]: dispatch, barrier, publish and cadence control
//!
//! ## Example
//!
//! ```ignore
//! let mut scheduler = CycleScheduler::new(config, &addresses, dispatcher)?;
//! scheduler.start(&controller).await?;
//! let (summary, dispatcher) = scheduler.run(cancel_token).await?;
//! ```

mod aggregate;
mod cadence;
mod error;
mod partition;
mod scheduler;
mod store;
mod worker;

pub use aggregate::aggregate;
pub use cadence::{plan_sleep, CadencePlan};
pub use error::{PollerError, Result};
pub use partition::{partition, Shard};
pub use scheduler::{CycleOutcome, CycleScheduler, RunSummary, SchedulerConfig, SchedulerState};
pub use store::{LastValueStore, StoreShard};
pub use worker::{classify, Worker, WorkerFragment};

pub use tokio_util::sync::CancellationToken;
