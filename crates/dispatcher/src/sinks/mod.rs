//! Sink implementations
//!
//! Contains LogSink, FileSink, NetworkSink, NatsSink and InfluxSink.

mod file;
mod influx;
mod log;
mod nats;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::influx::{line_protocol, InfluxSink, InfluxSinkConfig};
pub use self::log::LogSink;
pub use self::nats::{NatsSink, NatsSinkConfig};
pub use self::network::{NetworkSink, NetworkSinkConfig};
