//! Transport layer for the smart meter head-end
//!
//! Sessions never open sockets themselves: they ask a [`Connector`] for a
//! [`ByteStream`]. [`TcpConnector`] dials plain TCP; tests and demos plug in
//! in-memory connectors instead.

pub mod stream;
pub mod tcp;

pub use stream::{ByteStream, Connector, Endpoint};
pub use tcp::{TcpConnector, TcpSettings};
