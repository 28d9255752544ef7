//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the poller.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every reading carries the start time of its poll cycle (milliseconds since the Unix epoch)
//! - `cycle_id` is a monotonically increasing counter, used for ordering/diagnostics

mod address_source;
mod blueprint;
mod cycle;
mod error;
mod reader;
mod sink;
mod tag;
mod tag_address;

pub use address_source::AddressSource;
pub use blueprint::*;
pub use cycle::*;
pub use error::*;
pub use reader::{LocalTagReader, TagReader};
pub use sink::*;
pub use tag::*;
pub use tag_address::TagAddress;
