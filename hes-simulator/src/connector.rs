//! In-memory [`Connector`] backed by simulated meters

use crate::meter::SimulatedMeter;
use crate::server::serve;
use async_trait::async_trait;
use hes_core::{DlmsError, DlmsResult};
use hes_transport::{ByteStream, Connector, Endpoint};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DUPLEX_BUFFER_SIZE: usize = 4096;

/// Connects to simulated meters by host name
///
/// Every connect opens a fresh link over a `tokio::io::duplex` pipe; the
/// object model of the meter registered for the host is shared across
/// connects. Unknown hosts refuse the connection, unreachable ones let the
/// connect timeout expire.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConnector {
    meters: HashMap<String, SimulatedMeter>,
    unreachable: HashSet<String>,
    connects: Arc<AtomicUsize>,
}

impl SimulatorConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meter(mut self, host: impl Into<String>, meter: SimulatedMeter) -> Self {
        self.meters.insert(host.into(), meter);
        self
    }

    /// Connects to `host` hang until the caller's connect timeout
    pub fn with_unreachable(mut self, host: impl Into<String>) -> Self {
        self.unreachable.insert(host.into());
        self
    }

    /// Connect attempts so far, including failed ones
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for SimulatorConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> DlmsResult<Box<dyn ByteStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.unreachable.contains(&endpoint.host) {
            tokio::time::sleep(timeout).await;
            return Err(DlmsError::Connection(format!(
                "Connect to {} timed out after {} ms",
                endpoint,
                timeout.as_millis()
            )));
        }

        let meter = self.meters.get(&endpoint.host).cloned().ok_or_else(|| {
            DlmsError::Connection(format!("Connect to {} failed: connection refused", endpoint))
        })?;

        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
        let peer = endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = serve(server, meter).await {
                debug!("Simulated meter {} stopped: {}", peer, e);
            }
        });
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::ErrorKind;
    use hes_session::{FrameType, HdlcAddress, HdlcFrame, HdlcFrameDecoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_unknown_host_is_refused() {
        let connector = SimulatorConnector::new();
        let err = connector
            .connect(&Endpoint::new("nowhere", 4059), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_host_times_out() {
        let connector = SimulatorConnector::new().with_unreachable("meter-b");
        let started = Instant::now();
        let err = connector
            .connect(&Endpoint::new("meter-b", 4059), Duration::from_secs(30))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_connect_serves_meter() {
        let connector = SimulatorConnector::new().with_meter("meter-a", SimulatedMeter::new());
        let mut stream = connector
            .connect(&Endpoint::new("meter-a", 4059), Duration::from_secs(1))
            .await
            .unwrap();

        let client = HdlcAddress::client(0x10).unwrap();
        let server = HdlcAddress::server(1, None).unwrap();
        let snrm = HdlcFrame::snrm(server, client).encode().unwrap();
        stream.write_all(&snrm).await.unwrap();

        let mut decoder = HdlcFrameDecoder::new();
        let mut buf = [0u8; 128];
        let frame = loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            if let Some(frame) = decoder.feed(&buf[..n]).pop() {
                break frame;
            }
        };
        assert_eq!(frame.frame_type(), FrameType::UnnumberedAcknowledge);
    }
}
