//! Fleet-level meter communication
//!
//! [`ConnectionManager`] is the one long-lived object callers hold: it looks
//! meters up in a [`MeterDirectory`], opens a short-lived session per
//! operation, reads in bounded batches, and hands results to optional
//! [`ReadingSink`] / [`EventSink`] collaborators. Every call returns a result
//! record; protocol errors never escape as `Err`.

pub mod config;
pub mod directory;
pub mod manager;
pub mod result;
pub mod sink;

pub use config::{FleetConfig, MeterEntry, RetryPolicy};
pub use directory::{MeterDirectory, StaticMeterDirectory};
pub use manager::ConnectionManager;
pub use result::{MeterCommunicationResult, OperationResult};
pub use sink::{EventSink, MeterEvent, ReadingSink};
