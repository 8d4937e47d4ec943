use chrono::{DateTime, Utc};
use hes_core::DlmsError;
use hes_driver::MeterReading;
use serde::{Deserialize, Serialize};

/// Outcome of one meter conversation
///
/// `data` carries the payload on success; on failure `error` holds the
/// human-readable cause and `data` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterCommunicationResult<T = MeterReading> {
    pub meter_id: String,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> MeterCommunicationResult<T> {
    pub fn ok(meter_id: impl Into<String>, data: T) -> Self {
        Self {
            meter_id: meter_id.into(),
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(meter_id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            meter_id: meter_id.into(),
            success: false,
            data: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a command that returns nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub error: Option<String>,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<(), DlmsError>> for OperationResult {
    fn from(result: Result<(), DlmsError>) -> Self {
        match result {
            Ok(()) => OperationResult::ok(),
            Err(e) => OperationResult::failed(e),
        }
    }
}
