//! # Controller
//!
//! Controller connection module.
//!
//! Responsibilities:
//! - Open one controller connection per worker
//! - Provide the `TagReader` implementation used by workers
//! - Provide a simulated controller (values, latency, failure injection)
//!
//! The controller's wire protocol is not part of this crate; a real driver
//! plugs in by implementing [`Connector`] and [`contracts::TagReader`].

pub mod connector;
pub mod error;
pub mod factory;
pub mod simulated;

pub use connector::Connector;
pub use contracts::{TagReader, TagValue};
pub use error::{ControllerError, Result};
pub use factory::ConnectionFactory;
pub use simulated::{SimulatedConfig, SimulatedConnection, SimulatedController};
