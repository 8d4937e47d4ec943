//! TCP transport implementation

use crate::stream::{ByteStream, Connector, Endpoint};
use async_trait::async_trait;
use hes_core::{DlmsError, DlmsResult};
use std::time::Duration;
use tokio::net::TcpStream;

/// TCP socket options
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// Disable Nagle; frames are small and strictly request/response
    pub nodelay: bool,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self { nodelay: true }
    }
}

/// Plain TCP connector, no TLS
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    settings: TcpSettings,
}

impl TcpConnector {
    pub fn new(settings: TcpSettings) -> Self {
        Self { settings }
    }

    /// Dial `endpoint` and return the raw socket
    pub async fn connect_tcp(&self, endpoint: &Endpoint, timeout: Duration) -> DlmsResult<TcpStream> {
        let target = (endpoint.host.as_str(), endpoint.port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(target))
            .await
            .map_err(|_| {
                DlmsError::Connection(format!(
                    "Connect to {} timed out after {} ms",
                    endpoint,
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| DlmsError::Connection(format!("Connect to {} failed: {}", endpoint, e)))?;

        if self.settings.nodelay {
            stream.set_nodelay(true)?;
        }
        log::debug!("TCP connected to {}", endpoint);
        Ok(stream)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> DlmsResult<Box<dyn ByteStream>> {
        let stream = self.connect_tcp(endpoint, timeout).await?;
        Ok(Box::new(stream))
    }
}
