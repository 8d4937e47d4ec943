//! Per-meter DLMS/COSEM session
//!
//! A [`MeterSession`] owns one connection to one meter and walks it through
//! `Disconnected → Connecting → Connected → Associating → Associated →
//! Releasing → Disconnected`. Requests on a session are strictly sequential:
//! a second request while one is outstanding is rejected with
//! [`DlmsError::RequestInFlight`](hes_core::DlmsError::RequestInFlight).

pub mod config;
pub mod connection;
mod pending;
pub mod session;
pub mod state;

pub use config::{MeterDriverConfig, MeterDriverConfigBuilder};
pub use connection::CosemConnection;
pub use session::MeterSession;
pub use state::SessionState;
