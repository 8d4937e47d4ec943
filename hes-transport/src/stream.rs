//! Stream and connector abstractions

use async_trait::async_trait;
use hes_core::DlmsResult;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Bidirectional byte stream to a remote meter
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Network address of a meter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens byte streams to meters
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a stream to `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `Connection` when the peer refuses or is unreachable and when
    /// `timeout` elapses first.
    async fn connect(&self, endpoint: &Endpoint, timeout: Duration)
    -> DlmsResult<Box<dyn ByteStream>>;
}
