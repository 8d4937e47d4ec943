//! Fleet-level meter communication
//!
//! Every operation runs on its own short-lived session: look the meter up,
//! connect and associate, do the work through the brand driver, then release
//! and disconnect. No socket outlives the call that opened it, so the number
//! of meters served is not bounded by open connections.

use crate::config::{FleetConfig, RetryPolicy, DEFAULT_BATCH_SIZE};
use crate::directory::{MeterDirectory, StaticMeterDirectory};
use crate::result::{MeterCommunicationResult, OperationResult};
use crate::sink::{EventSink, MeterEvent, ReadingSink};
use chrono::{DateTime, FixedOffset, Utc};
use futures::future::join_all;
use hes_client::{MeterDriverConfig, MeterSession};
use hes_core::{DlmsError, DlmsResult, ErrorKind, ObisCode};
use hes_driver::{create_driver, LogicalField, MeterDriver, MeterReading, ReadingRecord, RelayAction};
use hes_transport::{Connector, TcpConnector};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SessionMap = Mutex<HashMap<String, Arc<MeterSession>>>;

fn lock(sessions: &SessionMap) -> MutexGuard<'_, HashMap<String, Arc<MeterSession>>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a meter's session from the live map, also when the operation is dropped
///
/// Only its own entry: after `close_all_connections` the id may already
/// belong to a newer operation.
struct Tracked<'a> {
    sessions: &'a SessionMap,
    meter_id: String,
    session: Arc<MeterSession>,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        let mut sessions = lock(self.sessions);
        let owned = sessions
            .get(&self.meter_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.session));
        if owned {
            sessions.remove(&self.meter_id);
        }
    }
}

/// Why a reading with no successful field failed
///
/// Keeps a lost link a connection or timeout error so it is retried and
/// reported as lost communication.
fn unreadable(reading: &MeterReading) -> DlmsError {
    let cause = reading
        .failures()
        .find_map(|(_, record)| record.error.clone())
        .unwrap_or_else(|| "no objects".to_string());
    let message = format!("No field could be read: {}", cause);
    match reading.link_failure() {
        Some(ErrorKind::Connection) => DlmsError::Connection(message),
        Some(ErrorKind::Timeout) => DlmsError::Timeout(message),
        _ => DlmsError::protocol(message),
    }
}

fn is_retryable(error: &DlmsError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Connection | ErrorKind::Association | ErrorKind::Timeout
    )
}

pub struct ConnectionManager {
    directory: Arc<dyn MeterDirectory>,
    connector: Arc<dyn Connector>,
    reading_sink: Option<Arc<dyn ReadingSink>>,
    event_sink: Option<Arc<dyn EventSink>>,
    batch_size: usize,
    retry: RetryPolicy,
    sessions: SessionMap,
}

impl ConnectionManager {
    pub fn new(directory: Arc<dyn MeterDirectory>, connector: Arc<dyn Connector>) -> Self {
        Self {
            directory,
            connector,
            reading_sink: None,
            event_sink: None,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Plain TCP to the meters listed in `config`
    pub fn from_config(config: &FleetConfig) -> Self {
        let directory: StaticMeterDirectory = config.meters.iter().cloned().collect();
        Self::new(Arc::new(directory), Arc::new(TcpConnector::default())).with_config(config)
    }

    pub fn with_config(mut self, config: &FleetConfig) -> Self {
        self.batch_size = config.batch_size.max(1);
        self.retry = config.retry;
        self
    }

    pub fn with_reading_sink(mut self, sink: Arc<dyn ReadingSink>) -> Self {
        self.reading_sink = Some(sink);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Sessions currently open on behalf of running operations
    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Read every field of one meter
    ///
    /// Fails only when the meter cannot be reached, refuses association, or
    /// no field at all could be read; otherwise the reading may be partial.
    pub async fn read_meter_data(&self, meter_id: &str) -> MeterCommunicationResult {
        let outcome = self
            .run(meter_id, |driver| async move {
                let reading = driver.read_all_data().await;
                if reading.successful_fields().next().is_none() {
                    return Err(unreadable(&reading));
                }
                Ok(reading)
            })
            .await;

        match outcome {
            Ok(reading) => {
                self.store(meter_id, &reading).await;
                self.check_tamper(meter_id, &reading).await;
                MeterCommunicationResult::ok(meter_id, reading)
            }
            Err(e) => {
                error!("Reading meter {} failed: {}", meter_id, e);
                self.report_loss(meter_id, &e).await;
                MeterCommunicationResult::failed(meter_id, e)
            }
        }
    }

    /// Read many meters, `batch_size` at a time
    ///
    /// Each meter gets its own result; one meter failing or hanging until
    /// its deadline never fails the others. Duplicate ids are read once.
    pub async fn read_multiple_meters<S: AsRef<str>>(
        &self,
        meter_ids: &[S],
    ) -> HashMap<String, MeterCommunicationResult> {
        let mut seen = HashSet::new();
        let ids: Vec<&str> = meter_ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| seen.insert(*id))
            .collect();

        let mut results = HashMap::with_capacity(ids.len());
        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            debug!("Reading batch {} ({} meters)", index + 1, batch.len());
            let batch_results = join_all(batch.iter().map(|id| self.read_meter_data(id))).await;
            for result in batch_results {
                results.insert(result.meter_id.clone(), result);
            }
        }

        let failed = results.values().filter(|r| !r.success).count();
        info!("Read {} meters, {} failed", results.len(), failed);
        results
    }

    pub async fn control_relay(&self, meter_id: &str, action: RelayAction) -> OperationResult {
        let outcome = self
            .run(meter_id, |driver| async move { driver.relay_control(action).await })
            .await;
        if let Err(e) = &outcome {
            error!("Relay {} on meter {} failed: {}", action.as_str(), meter_id, e);
        }
        self.notify(MeterEvent::RelayOperated {
            meter_id: meter_id.to_string(),
            action,
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            at: Utc::now(),
        })
        .await;
        outcome.into()
    }

    /// Synchronize the meter clock; `None` means now
    pub async fn set_meter_time(
        &self,
        meter_id: &str,
        date_time: Option<DateTime<FixedOffset>>,
    ) -> OperationResult {
        let date_time = date_time.unwrap_or_else(|| Utc::now().fixed_offset());
        let outcome = self
            .run(meter_id, |driver| async move { driver.set_meter_time(date_time).await })
            .await;
        if let Err(e) = &outcome {
            error!("Setting time on meter {} failed: {}", meter_id, e);
        }
        outcome.into()
    }

    pub async fn read_obis_code(
        &self,
        meter_id: &str,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
    ) -> MeterCommunicationResult<ReadingRecord> {
        let outcome = self
            .run(meter_id, |driver| async move {
                Ok(driver.read_custom_obis(obis, class_id, attribute_id).await)
            })
            .await;
        match outcome {
            Ok(record) if record.success => MeterCommunicationResult::ok(meter_id, record),
            Ok(record) => {
                let error = record.error.unwrap_or_else(|| "Read failed".to_string());
                MeterCommunicationResult::failed(meter_id, error)
            }
            Err(e) => MeterCommunicationResult::failed(meter_id, e),
        }
    }

    /// Release and disconnect every tracked session; safe to call repeatedly
    pub async fn close_all_connections(&self) {
        let sessions: Vec<(String, Arc<MeterSession>)> = lock(&self.sessions).drain().collect();
        if sessions.is_empty() {
            return;
        }
        info!("Closing {} meter sessions", sessions.len());
        join_all(sessions.iter().map(|(_, session)| session.release())).await;
    }

    /// Look the meter up, then run `operation` with retries
    async fn run<T, F, Fut>(&self, meter_id: &str, operation: F) -> DlmsResult<T>
    where
        F: Fn(Box<dyn MeterDriver>) -> Fut,
        Fut: Future<Output = DlmsResult<T>>,
    {
        let config = self
            .directory
            .lookup(meter_id)
            .await?
            .ok_or_else(|| DlmsError::InvalidState(format!("Meter {} not found", meter_id)))?;

        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(meter_id, &config, &operation).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    warn!(
                        "Meter {} attempt {}/{} failed: {}",
                        meter_id, attempt, attempts, e
                    );
                    tokio::time::sleep(self.retry.delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One short-lived session: open, operate, release
    async fn attempt<T, F, Fut>(
        &self,
        meter_id: &str,
        config: &MeterDriverConfig,
        operation: &F,
    ) -> DlmsResult<T>
    where
        F: Fn(Box<dyn MeterDriver>) -> Fut,
        Fut: Future<Output = DlmsResult<T>>,
    {
        let session = Arc::new(MeterSession::new(config.clone(), self.connector.clone())?);
        let _tracked = self.track(meter_id, &session)?;

        let outcome = match session.open().await {
            Ok(()) => operation(create_driver(config.brand, session.clone())).await,
            Err(e) => Err(e),
        };
        session.release().await;
        outcome
    }

    fn track(&self, meter_id: &str, session: &Arc<MeterSession>) -> DlmsResult<Tracked<'_>> {
        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(meter_id) {
            return Err(DlmsError::InvalidState(format!(
                "Meter {} is busy with another operation",
                meter_id
            )));
        }
        sessions.insert(meter_id.to_string(), session.clone());
        Ok(Tracked {
            sessions: &self.sessions,
            meter_id: meter_id.to_string(),
            session: session.clone(),
        })
    }

    async fn store(&self, meter_id: &str, reading: &MeterReading) {
        if let Some(sink) = &self.reading_sink {
            if let Err(e) = sink.store(meter_id, reading).await {
                warn!("Storing reading of meter {} failed: {}", meter_id, e);
            }
        }
    }

    async fn notify(&self, event: MeterEvent) {
        if let Some(sink) = &self.event_sink {
            let meter_id = event.meter_id().to_string();
            if let Err(e) = sink.notify(event).await {
                warn!("Event for meter {} not delivered: {}", meter_id, e);
            }
        }
    }

    async fn check_tamper(&self, meter_id: &str, reading: &MeterReading) {
        if let Some(status) = reading.number(LogicalField::TamperStatus) {
            if status != 0.0 {
                warn!("Meter {} reports tamper status {}", meter_id, status);
                self.notify(MeterEvent::TamperDetected {
                    meter_id: meter_id.to_string(),
                    status,
                    at: Utc::now(),
                })
                .await;
            }
        }
    }

    async fn report_loss(&self, meter_id: &str, error: &DlmsError) {
        if is_retryable(error) {
            self.notify(MeterEvent::CommunicationLost {
                meter_id: meter_id.to_string(),
                error: error.to_string(),
                at: Utc::now(),
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MockMeterDirectory;
    use crate::sink::{MockEventSink, MockReadingSink};
    use hes_core::{DlmsValue, Unit};
    use hes_driver::HEXING_OBJECTS;
    use hes_simulator::{SimulatedMeter, SimulatorConnector};
    use std::time::Duration;
    use tokio::time::Instant;

    const TOTAL_ENERGY: ObisCode = ObisCode::new(1, 0, 15, 8, 0, 255);
    const VOLTAGE: ObisCode = ObisCode::new(1, 0, 32, 7, 0, 255);
    const SERIAL: ObisCode = ObisCode::new(0, 0, 96, 1, 0, 255);
    const TAMPER: ObisCode = ObisCode::new(0, 0, 96, 5, 0, 255);

    fn meter(serial: &str) -> SimulatedMeter {
        SimulatedMeter::new()
            .with_object(SERIAL, 1, 2, DlmsValue::OctetString(serial.as_bytes().to_vec()))
            .with_register(TOTAL_ENERGY, DlmsValue::Unsigned32(12345), -2, Unit::WATT_HOUR.code())
            .with_register(VOLTAGE, DlmsValue::Unsigned16(2301), -1, Unit::VOLT.code())
            .with_relay(true)
    }

    fn directory(ids: &[&str]) -> StaticMeterDirectory {
        ids.iter().fold(StaticMeterDirectory::new(), |directory, id| {
            directory.with_meter(*id, MeterDriverConfig::builder(*id).build().unwrap())
        })
    }

    fn manager(ids: &[&str], connector: SimulatorConnector) -> ConnectionManager {
        ConnectionManager::new(Arc::new(directory(ids)), Arc::new(connector))
    }

    #[tokio::test]
    async fn test_read_meter_data_uses_short_lived_session() {
        let connector = SimulatorConnector::new().with_meter("A", meter("SN-A"));
        let manager = manager(&["A"], connector.clone());

        let result = manager.read_meter_data("A").await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.meter_id, "A");
        let reading = result.data.unwrap();
        assert_eq!(reading.number(LogicalField::TotalActiveEnergy), Some(123.45));
        assert_eq!(reading.text(LogicalField::SerialNumber), Some("SN-A"));

        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_meter_is_failed_result() {
        let connector = SimulatorConnector::new();
        let manager = manager(&[], connector.clone());

        let result = manager.read_meter_data("nope").await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("not found"));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_isolates_timed_out_meter() {
        let connector = SimulatorConnector::new()
            .with_meter("A", meter("SN-A"))
            .with_meter("B", meter("SN-B").silent_link())
            .with_meter("C", meter("SN-C"));

        let mut readings = MockReadingSink::new();
        readings
            .expect_store()
            .withf(|meter_id, _| meter_id == "A" || meter_id == "C")
            .times(2)
            .returning(|_, _| Ok(()));
        let mut events = MockEventSink::new();
        events
            .expect_notify()
            .withf(|event| matches!(event, MeterEvent::CommunicationLost { meter_id, .. } if meter_id == "B"))
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(&["A", "B", "C"], connector)
            .with_reading_sink(Arc::new(readings))
            .with_event_sink(Arc::new(events));

        let started = Instant::now();
        let results = manager.read_multiple_meters(&["A", "B", "C"]).await;
        assert!(started.elapsed() >= Duration::from_secs(30));

        assert_eq!(results.len(), 3);
        assert!(results["A"].success);
        assert!(results["C"].success);
        assert!(!results["B"].success);
        assert!(results["B"].data.is_none());
        assert!(results["B"].error.is_some());
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let ids = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
        let connector = ids.iter().fold(SimulatorConnector::new(), |connector, id| {
            connector.with_meter(*id, meter(id))
        });
        let config = FleetConfig {
            batch_size: 3,
            ..FleetConfig::default()
        };
        let manager = manager(&ids, connector.clone()).with_config(&config);

        // m1 twice: duplicates are read once
        let mut requested = ids.to_vec();
        requested.push("m1");
        let results = manager.read_multiple_meters(&requested).await;
        assert_eq!(results.len(), 7);
        assert!(results.values().all(|r| r.success));
        assert_eq!(connector.connect_count(), 7);
    }

    #[tokio::test]
    async fn test_control_relay_emits_event() {
        let simulated = meter("SN-A");
        let connector = SimulatorConnector::new().with_meter("A", simulated.clone());

        let mut events = MockEventSink::new();
        events
            .expect_notify()
            .withf(|event| {
                matches!(
                    event,
                    MeterEvent::RelayOperated { action: RelayAction::Disconnect, success: true, .. }
                )
            })
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(&["A"], connector).with_event_sink(Arc::new(events));
        let result = manager.control_relay("A", RelayAction::Disconnect).await;
        assert_eq!(result, OperationResult::ok());
        assert!(!simulated.relay_connected());
    }

    #[tokio::test]
    async fn test_relay_failure_is_reported_not_raised() {
        let connector = SimulatorConnector::new()
            .with_meter("A", meter("SN-A").access_error(hes_simulator::RELAY_OBIS, 3));
        let manager = manager(&["A"], connector);

        let result = manager.control_relay("A", RelayAction::Connect).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Relay connect failed"));
    }

    #[tokio::test]
    async fn test_tamper_flag_raises_event() {
        let connector = SimulatorConnector::new()
            .with_meter("A", meter("SN-A").with_object(TAMPER, 1, 2, DlmsValue::Unsigned8(2)));
        let mut events = MockEventSink::new();
        events
            .expect_notify()
            .withf(|event| matches!(event, MeterEvent::TamperDetected { status, .. } if *status == 2.0))
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(&["A"], connector).with_event_sink(Arc::new(events));
        assert!(manager.read_meter_data("A").await.success);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_read() {
        let connector = SimulatorConnector::new().with_meter("A", meter("SN-A"));
        let mut readings = MockReadingSink::new();
        readings
            .expect_store()
            .returning(|_, _| Err(DlmsError::Connection("database down".into())));

        let manager = manager(&["A"], connector).with_reading_sink(Arc::new(readings));
        assert!(manager.read_meter_data("A").await.success);
    }

    #[tokio::test]
    async fn test_set_meter_time_and_read_obis() {
        let simulated = meter("SN-A").with_clock(hes_core::CosemDateTime::from_chrono(&Utc::now()));
        let connector = SimulatorConnector::new().with_meter("A", simulated.clone());
        let manager = manager(&["A"], connector);

        let time = Utc::now().with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());
        assert!(manager.set_meter_time("A", Some(time)).await.success);
        let stored = simulated.value(hes_simulator::CLOCK_OBIS, 2).unwrap();
        assert_eq!(
            stored,
            DlmsValue::OctetString(hes_core::CosemDateTime::from_chrono(&time).encode().to_vec())
        );

        let result = manager.read_obis_code("A", VOLTAGE, 3, 2).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap().value, Some(hes_driver::ReadingValue::Number(230.1)));

        let missing = manager
            .read_obis_code("A", ObisCode::new(1, 0, 99, 1, 0, 255), 7, 2)
            .await;
        assert!(!missing.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_reattempts_unreachable_meter() {
        let connector = SimulatorConnector::new().with_unreachable("A");
        let config = FleetConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                delay_ms: 1_000,
            },
            ..FleetConfig::default()
        };
        let manager = manager(&["A"], connector.clone()).with_config(&config);

        let result = manager.read_meter_data("A").await;
        assert!(!result.success);
        assert_eq!(connector.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_directory_error_is_failed_result() {
        let mut directory = MockMeterDirectory::new();
        directory
            .expect_lookup()
            .returning(|_| Err(DlmsError::Connection("directory offline".into())));
        let manager = ConnectionManager::new(Arc::new(directory), Arc::new(SimulatorConnector::new()));

        let result = manager.set_meter_time("A", None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("directory offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_meter_reported_as_lost() {
        let silent = HEXING_OBJECTS
            .iter()
            .fold(meter("SN-A"), |meter, object| meter.silent_object(object.obis));
        let connector = SimulatorConnector::new().with_meter("A", silent);

        let mut events = MockEventSink::new();
        events
            .expect_notify()
            .withf(|event| matches!(event, MeterEvent::CommunicationLost { meter_id, .. } if meter_id == "A"))
            .times(1)
            .returning(|_| Ok(()));
        let mut readings = MockReadingSink::new();
        readings.expect_store().never();

        let manager = manager(&["A"], connector)
            .with_reading_sink(Arc::new(readings))
            .with_event_sink(Arc::new(events));
        let result = manager.read_meter_data("A").await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("No field could be read"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_meter_is_retried() {
        let silent = HEXING_OBJECTS
            .iter()
            .fold(meter("SN-A"), |meter, object| meter.silent_object(object.obis));
        let connector = SimulatorConnector::new().with_meter("A", silent);
        let config = FleetConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                delay_ms: 0,
            },
            ..FleetConfig::default()
        };
        let manager = manager(&["A"], connector.clone()).with_config(&config);

        assert!(!manager.read_meter_data("A").await.success);
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_operation_keeps_newer_session_tracked() {
        let connector = SimulatorConnector::new()
            .with_meter("A", meter("SN-A").response_delay(Duration::from_millis(500)));
        let manager = manager(&["A"], connector.clone());

        let mut first = Box::pin(manager.read_obis_code("A", SERIAL, 1, 2));
        assert!(futures::poll!(&mut first).is_pending());
        assert_eq!(manager.active_sessions(), 1);

        manager.close_all_connections().await;
        assert_eq!(manager.active_sessions(), 0);

        let mut second = Box::pin(manager.read_obis_code("A", SERIAL, 1, 2));
        assert!(futures::poll!(&mut second).is_pending());
        assert_eq!(manager.active_sessions(), 1);

        // the first operation lost its link and ends while the second still runs
        assert!(!first.await.success);
        assert_eq!(manager.active_sessions(), 1);

        let third = manager.read_obis_code("A", SERIAL, 1, 2).await;
        assert!(!third.success);
        assert!(third.error.unwrap().contains("busy"));
        assert_eq!(connector.connect_count(), 2);

        assert!(second.await.success);
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_close_all_connections_is_idempotent() {
        let manager = manager(&[], SimulatorConnector::new());
        manager.close_all_connections().await;
        manager.close_all_connections().await;
        assert_eq!(manager.active_sessions(), 0);
    }
}
