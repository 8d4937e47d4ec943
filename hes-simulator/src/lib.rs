//! In-process DLMS/COSEM meter
//!
//! The simulator speaks the server side of the same subset the head-end
//! implements: SNRM/UA, AARQ/AARE with optional low-level security,
//! GET/SET/ACTION against an in-memory object model, RLRQ and DISC.
//! Faults (silence, rejections, data-access errors, noisy or slow links) are
//! scripted on the [`SimulatedMeter`] handle.
//!
//! ```rust,no_run
//! use hes_core::{DlmsValue, ObisCode};
//! use hes_simulator::{SimulatedMeter, SimulatorConnector};
//!
//! let meter = SimulatedMeter::new()
//!     .with_register(ObisCode::new(1, 0, 32, 7, 0, 255), DlmsValue::Unsigned16(2301), -1, 35)
//!     .with_relay(true);
//! let connector = SimulatorConnector::new().with_meter("meter-a", meter);
//! ```

pub mod connector;
pub mod meter;
pub mod server;

pub use connector::SimulatorConnector;
pub use meter::{Reply, SimulatedMeter, CLOCK_OBIS, RELAY_OBIS};
pub use server::{serve, serve_tcp};
