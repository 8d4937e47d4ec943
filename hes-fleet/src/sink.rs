//! Collaborators notified of readings and meter events
//!
//! Both sinks are best effort from the manager's point of view: a failing
//! sink is logged and never turns a successful meter operation into a
//! failed one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hes_core::DlmsResult;
use hes_driver::{MeterReading, RelayAction};
use serde::{Deserialize, Serialize};

/// Insert-only store of parsed readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn store(&self, meter_id: &str, reading: &MeterReading) -> DlmsResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeterEvent {
    RelayOperated {
        meter_id: String,
        action: RelayAction,
        success: bool,
        error: Option<String>,
        at: DateTime<Utc>,
    },
    /// Tamper status read back non-zero
    TamperDetected {
        meter_id: String,
        status: f64,
        at: DateTime<Utc>,
    },
    CommunicationLost {
        meter_id: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl MeterEvent {
    pub fn meter_id(&self) -> &str {
        match self {
            MeterEvent::RelayOperated { meter_id, .. }
            | MeterEvent::TamperDetected { meter_id, .. }
            | MeterEvent::CommunicationLost { meter_id, .. } => meter_id,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn notify(&self, event: MeterEvent) -> DlmsResult<()>;
}
