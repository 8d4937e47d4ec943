//! Connection and association state machine for one meter
//!
//! ```text
//! Disconnected --connect()--> Connecting --> Connected
//!     ^                                          |
//!     |                                     associate()
//!     |                                          v
//!     +---- failure ---------------------- Associating --> Associated
//!     |                                                        |
//!     +---- disconnect() (any state) <---- Releasing <--- release()
//! ```
//!
//! Each connection gets a reader task that owns the read half of the stream
//! and the streaming HDLC decoder. It resolves the single pending request;
//! callers wait on a oneshot channel with a deadline.

use crate::config::MeterDriverConfig;
use crate::connection::CosemConnection;
use crate::pending::{lock, Expectation, Inbound, PendingGuard, PendingSlot, Registration};
use crate::state::SessionState;
use async_trait::async_trait;
use hes_application::apdu::error_response;
use hes_application::{
    build_aarq, build_rlrq, parse_aare, parse_action_response, parse_get_response,
    parse_set_response, ApduKind, CosemAttributeDescriptor, CosemMethodDescriptor,
    InitiateResponse, InvokeIdCounter, ServiceRequest,
};
use hes_core::{DlmsError, DlmsResult, DlmsValue, ObisCode};
use hes_session::{
    strip_llc, FrameType, HdlcAddress, HdlcFrame, HdlcFrameDecoder, LinkParameters, LLC_REQUEST,
};
use hes_transport::{ByteStream, Connector, TcpConnector};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const READ_BUFFER_SIZE: usize = 2048;

/// Mutable per-connection bookkeeping
#[derive(Default)]
struct SessionInner {
    state: SessionState,
    /// Bumped on every connect and disconnect so a stale reader cannot touch a newer link
    generation: u64,
    send_sequence: u8,
    receive_sequence: u8,
    invokes: InvokeIdCounter,
    link_parameters: Option<LinkParameters>,
    negotiated: Option<InitiateResponse>,
}

/// State shared with the reader task
struct Shared {
    client: HdlcAddress,
    inner: Mutex<SessionInner>,
    pending: PendingSlot,
}

impl Shared {
    fn handle_frame(&self, frame: HdlcFrame) {
        if frame.destination() != self.client {
            debug!(
                "Ignoring frame addressed to {:?}, expected {:?}",
                frame.destination(),
                self.client
            );
            return;
        }
        if frame.is_segmented() {
            self.pending.fail(DlmsError::protocol(
                "Segmented HDLC frames are not supported",
            ));
            return;
        }

        match frame.frame_type() {
            FrameType::Information => {
                if let Some(ns) = frame.send_sequence() {
                    lock(&self.inner).receive_sequence = (ns + 1) & 0x07;
                }
                self.pending
                    .offer(Inbound::Apdu(strip_llc(frame.information_field())));
            }
            FrameType::UnnumberedAcknowledge => {
                self.pending.offer(Inbound::Ua(frame.information_field()));
            }
            FrameType::DisconnectMode => {
                self.pending.offer(Inbound::Dm);
            }
            other => debug!("Ignoring {:?} frame", other),
        }
    }

    fn connection_lost(&self, generation: u64, reason: String) {
        {
            let mut inner = lock(&self.inner);
            if inner.generation != generation {
                return;
            }
            if inner.state != SessionState::Releasing {
                warn!("Meter connection lost: {}", reason);
            }
            inner.state = SessionState::Disconnected;
        }
        self.pending.fail(DlmsError::Connection(reason));
    }
}

async fn read_loop(mut reader: ReadHalf<Box<dyn ByteStream>>, shared: Arc<Shared>, generation: u64) {
    let mut decoder = HdlcFrameDecoder::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let reason = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break "Connection closed by meter".to_string(),
            Ok(n) => {
                for frame in decoder.feed(&buf[..n]) {
                    shared.handle_frame(frame);
                }
            }
            Err(e) => break format!("Read failed: {}", e),
        }
    };
    let statistics = decoder.statistics();
    if statistics.frames_rejected > 0 {
        debug!(
            "Link statistics: {} frames received, {} rejected, {} bytes discarded",
            statistics.frames_received, statistics.frames_rejected, statistics.bytes_discarded
        );
    }
    shared.connection_lost(generation, reason);
}

/// Outbound message of an exchange
enum Outbound {
    Frame(HdlcFrame),
    Apdu(Vec<u8>),
}

/// One conversation with one meter
pub struct MeterSession {
    config: Arc<MeterDriverConfig>,
    connector: Arc<dyn Connector>,
    server: HdlcAddress,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<WriteHalf<Box<dyn ByteStream>>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl MeterSession {
    /// Create a disconnected session
    ///
    /// # Errors
    /// `Format` when the configured HDLC addresses are out of range.
    pub fn new(config: MeterDriverConfig, connector: Arc<dyn Connector>) -> DlmsResult<Self> {
        let client = config.client_hdlc_address()?;
        let server = config.server_hdlc_address()?;
        Ok(Self {
            config: Arc::new(config),
            connector,
            server,
            shared: Arc::new(Shared {
                client,
                inner: Mutex::new(SessionInner::default()),
                pending: PendingSlot::default(),
            }),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        })
    }

    /// Session over plain TCP
    pub fn tcp(config: MeterDriverConfig) -> DlmsResult<Self> {
        Self::new(config, Arc::new(TcpConnector::default()))
    }

    pub fn config(&self) -> &MeterDriverConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    /// Link parameters from the UA, once the link is up
    pub fn link_parameters(&self) -> Option<LinkParameters> {
        lock(&self.shared.inner).link_parameters
    }

    /// xDLMS parameters from the AARE, once associated
    pub fn negotiated(&self) -> Option<InitiateResponse> {
        lock(&self.shared.inner).negotiated
    }

    fn set_state(&self, state: SessionState) {
        let mut inner = lock(&self.shared.inner);
        debug!("Session {}: {} -> {}", self.config.endpoint(), inner.state, state);
        inner.state = state;
    }

    fn transition(&self, from: SessionState, to: SessionState, operation: &str) -> DlmsResult<()> {
        let mut inner = lock(&self.shared.inner);
        if inner.state != from {
            return Err(DlmsError::InvalidState(format!(
                "{}() requires state {}, session is {}",
                operation, from, inner.state
            )));
        }
        debug!("Session {}: {} -> {}", self.config.endpoint(), from, to);
        inner.state = to;
        Ok(())
    }

    /// Open the socket
    ///
    /// # Errors
    /// `Connection` on refusal, unreachable host or connect timeout; the
    /// session stays `Disconnected`.
    pub async fn connect(&self) -> DlmsResult<()> {
        let generation = {
            let mut inner = lock(&self.shared.inner);
            if inner.state != SessionState::Disconnected {
                return Err(DlmsError::InvalidState(format!(
                    "connect() requires state {}, session is {}",
                    SessionState::Disconnected,
                    inner.state
                )));
            }
            inner.state = SessionState::Connecting;
            inner.generation += 1;
            inner.generation
        };

        let endpoint = self.config.endpoint();
        let stream = match self
            .connector
            .connect(&endpoint, self.config.connect_timeout())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to connect to meter at {}: {}", endpoint, e);
                self.set_state(SessionState::Disconnected);
                return Err(match e {
                    DlmsError::Timeout(message) => DlmsError::Connection(message),
                    other => other,
                });
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);
        let handle = tokio::spawn(read_loop(read_half, Arc::clone(&self.shared), generation));
        if let Some(previous) = lock(&self.reader).replace(handle) {
            previous.abort();
        }

        {
            let mut inner = lock(&self.shared.inner);
            inner.state = SessionState::Connected;
            inner.send_sequence = 0;
            inner.receive_sequence = 0;
            inner.invokes = InvokeIdCounter::new();
            inner.link_parameters = None;
            inner.negotiated = None;
        }
        info!("Connected to meter at {}", endpoint);
        Ok(())
    }

    /// Establish the HDLC link (SNRM/UA) and the association (AARQ/AARE)
    ///
    /// # Errors
    /// `Association` when the meter rejects or does not answer within the
    /// link timeout. Any failure tears the connection down, leaving the
    /// session `Disconnected`.
    pub async fn associate(&self) -> DlmsResult<()> {
        self.transition(SessionState::Connected, SessionState::Associating, "associate")?;
        match self.establish_association().await {
            Ok(()) => {
                self.set_state(SessionState::Associated);
                info!("Association established with {}", self.config.endpoint());
                Ok(())
            }
            Err(e) => {
                warn!("Association with {} failed: {}", self.config.endpoint(), e);
                self.disconnect().await;
                Err(match e {
                    DlmsError::Timeout(message) => DlmsError::Association(message),
                    other => other,
                })
            }
        }
    }

    async fn establish_association(&self) -> DlmsResult<()> {
        let timeout = self.config.link_timeout();

        let snrm = HdlcFrame::snrm(self.server, self.shared.client);
        let ua = self
            .exchange(Expectation::LinkAck, timeout, "UA", Outbound::Frame(snrm))
            .await?;
        let parameters = LinkParameters::decode(&ua)?;
        {
            let mut inner = lock(&self.shared.inner);
            inner.link_parameters = Some(parameters);
            inner.send_sequence = 0;
            inner.receive_sequence = 0;
        }
        debug!("Link established: {:?}", parameters);

        let aarq = build_aarq(self.config.password.as_deref().map(str::as_bytes));
        let aare = self
            .exchange(Expectation::Association, timeout, "AARE", Outbound::Apdu(aarq))
            .await?;
        if ApduKind::classify(&aare).is_some_and(|kind| kind.is_error_response()) {
            return Err(error_response(&aare));
        }
        let negotiated = parse_aare(&aare)?.into_result()?;
        lock(&self.shared.inner).negotiated = negotiated;
        Ok(())
    }

    /// Connect and associate
    pub async fn open(&self) -> DlmsResult<()> {
        self.connect().await?;
        self.associate().await
    }

    /// Send one confirmed service request and wait for its response APDU
    ///
    /// # Errors
    /// - `InvalidState` unless associated
    /// - `RequestInFlight` while another request is outstanding
    /// - `Timeout` when the request deadline passes; the link stays up
    /// - `Connection` when the link drops while waiting
    pub async fn request(&self, request: &ServiceRequest) -> DlmsResult<Vec<u8>> {
        {
            let state = self.state();
            if !state.is_associated() {
                return Err(DlmsError::InvalidState(format!(
                    "{} requires an association, session is {}",
                    request.name(),
                    state
                )));
            }
        }

        let response_tag = request.response_tag();
        let timeout = self.config.request_timeout();
        let deadline = Instant::now() + timeout;
        let Registration {
            token,
            expectation,
            receiver,
        } = self.shared.pending.register(deadline, || Expectation::Service {
            response_tag,
            invoke: lock(&self.shared.inner).invokes.next_id(),
        })?;
        let _guard = PendingGuard::new(&self.shared.pending, token);

        let Expectation::Service { invoke, .. } = expectation else {
            return Err(DlmsError::InvalidState("Service request without invoke id".to_string()));
        };
        debug!("{} (invoke id {})", request, invoke.invoke_id());
        self.send_apdu(request.encode(invoke)).await?;
        self.wait(receiver, deadline, timeout, request.name()).await
    }

    async fn exchange(
        &self,
        expectation: Expectation,
        timeout: Duration,
        what: &str,
        outbound: Outbound,
    ) -> DlmsResult<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let registration = self.shared.pending.register(deadline, || expectation)?;
        let _guard = PendingGuard::new(&self.shared.pending, registration.token);
        match outbound {
            Outbound::Frame(frame) => self.send_frame(&frame).await?,
            Outbound::Apdu(apdu) => self.send_apdu(apdu).await?,
        }
        self.wait(registration.receiver, deadline, timeout, what).await
    }

    async fn wait(
        &self,
        receiver: oneshot::Receiver<DlmsResult<Vec<u8>>>,
        deadline: Instant,
        timeout: Duration,
        what: &str,
    ) -> DlmsResult<Vec<u8>> {
        match tokio::time::timeout_at(deadline, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DlmsError::Connection(format!(
                "Link closed while waiting for {}",
                what
            ))),
            Err(_) => Err(DlmsError::Timeout(format!(
                "No {} response within {} ms",
                what,
                timeout.as_millis()
            ))),
        }
    }

    async fn send_frame(&self, frame: &HdlcFrame) -> DlmsResult<()> {
        let bytes = frame.encode()?;
        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| DlmsError::Connection("Session is not connected".to_string()))?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Wrap an APDU in an LLC header and an I-frame with the next N(S)
    async fn send_apdu(&self, apdu: Vec<u8>) -> DlmsResult<()> {
        let (ns, nr) = {
            let mut inner = lock(&self.shared.inner);
            let ns = inner.send_sequence;
            inner.send_sequence = (ns + 1) & 0x07;
            (ns, inner.receive_sequence)
        };
        let mut information = Vec::with_capacity(apdu.len() + LLC_REQUEST.len());
        information.extend_from_slice(&LLC_REQUEST);
        information.extend_from_slice(&apdu);
        let frame = HdlcFrame::information(self.server, self.shared.client, ns, nr, information);
        self.send_frame(&frame).await
    }

    pub async fn get(&self, obis: ObisCode, class_id: u16, attribute_id: u8) -> DlmsResult<DlmsValue> {
        let request = ServiceRequest::Get {
            attribute: CosemAttributeDescriptor::new(class_id, obis, attribute_id),
        };
        parse_get_response(&self.request(&request).await?)
    }

    pub async fn set(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
        value: DlmsValue,
    ) -> DlmsResult<()> {
        let request = ServiceRequest::Set {
            attribute: CosemAttributeDescriptor::new(class_id, obis, attribute_id),
            value,
        };
        parse_set_response(&self.request(&request).await?)
    }

    pub async fn action(
        &self,
        obis: ObisCode,
        class_id: u16,
        method_id: u8,
        parameters: Option<DlmsValue>,
    ) -> DlmsResult<Option<DlmsValue>> {
        let request = ServiceRequest::Action {
            method: CosemMethodDescriptor::new(class_id, obis, method_id),
            parameters,
        };
        parse_action_response(&self.request(&request).await?)
    }

    /// Best-effort release: RLRQ and DISC without waiting, then disconnect
    pub async fn release(&self) {
        let associated = {
            let mut inner = lock(&self.shared.inner);
            if inner.state == SessionState::Associated {
                inner.state = SessionState::Releasing;
                true
            } else {
                false
            }
        };
        if associated {
            if let Err(e) = self.send_apdu(build_rlrq()).await {
                debug!("RLRQ not sent: {}", e);
            }
            if let Err(e) = self.send_frame(&HdlcFrame::disc(self.server, self.shared.client)).await {
                debug!("DISC not sent: {}", e);
            }
            info!("Association with {} released", self.config.endpoint());
        }
        self.disconnect().await;
    }

    /// Close the socket and clear all per-connection state; idempotent
    pub async fn disconnect(&self) {
        if let Some(handle) = lock(&self.reader).take() {
            handle.abort();
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let previous = {
            let mut inner = lock(&self.shared.inner);
            let previous = inner.state;
            inner.state = SessionState::Disconnected;
            inner.generation += 1;
            inner.link_parameters = None;
            inner.negotiated = None;
            previous
        };
        self.shared
            .pending
            .fail(DlmsError::Connection("Session disconnected".to_string()));
        if previous != SessionState::Disconnected {
            debug!("Disconnected from {}", self.config.endpoint());
        }
    }
}

impl Drop for MeterSession {
    fn drop(&mut self) {
        let reader = self.reader.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = reader.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl CosemConnection for MeterSession {
    async fn get_attribute(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
    ) -> DlmsResult<DlmsValue> {
        self.get(obis, class_id, attribute_id).await
    }

    async fn set_attribute(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
        value: DlmsValue,
    ) -> DlmsResult<()> {
        self.set(obis, class_id, attribute_id, value).await
    }

    async fn invoke_method(
        &self,
        obis: ObisCode,
        class_id: u16,
        method_id: u8,
        parameters: Option<DlmsValue>,
    ) -> DlmsResult<Option<DlmsValue>> {
        self.action(obis, class_id, method_id, parameters).await
    }
}
