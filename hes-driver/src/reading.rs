//! Normalized reading records handed to callers above the driver layer

use crate::field::LogicalField;
use chrono::{DateTime, FixedOffset, Utc};
use hes_core::{DlmsError, ErrorKind, MeterBrand, ObisCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A decoded, scaled value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Flag(bool),
    Time(DateTime<FixedOffset>),
    Text(String),
}

impl ReadingValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReadingValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ReadingValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            ReadingValue::Time(v) => Some(*v),
            _ => None,
        }
    }
}

/// Outcome of reading one object, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub obis_code: ObisCode,
    pub name: String,
    pub value: Option<ReadingValue>,
    pub unit: Option<String>,
    pub scaler: Option<i8>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    /// Class of the failure, kept so callers can tell a lost link from a refused object
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl ReadingRecord {
    pub fn success(obis_code: ObisCode, name: impl Into<String>, value: ReadingValue) -> Self {
        Self {
            obis_code,
            name: name.into(),
            value: Some(value),
            unit: None,
            scaler: None,
            timestamp: Utc::now(),
            success: true,
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(obis_code: ObisCode, name: impl Into<String>, error: &DlmsError) -> Self {
        Self {
            obis_code,
            name: name.into(),
            value: None,
            unit: None,
            scaler: None,
            timestamp: Utc::now(),
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn with_scaling(mut self, scaler: Option<i8>, unit: Option<String>) -> Self {
        self.scaler = scaler;
        self.unit = unit;
        self
    }
}

/// Every field read in one pass over a meter
///
/// Failed fields keep their record (with the error text) but are invisible
/// to the value accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub brand: MeterBrand,
    pub read_at: DateTime<Utc>,
    pub records: BTreeMap<LogicalField, ReadingRecord>,
}

impl MeterReading {
    pub fn new(brand: MeterBrand) -> Self {
        Self {
            brand,
            read_at: Utc::now(),
            records: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field: LogicalField, record: ReadingRecord) {
        self.records.insert(field, record);
    }

    pub fn value(&self, field: LogicalField) -> Option<&ReadingValue> {
        self.records
            .get(&field)
            .filter(|record| record.success)
            .and_then(|record| record.value.as_ref())
    }

    pub fn number(&self, field: LogicalField) -> Option<f64> {
        self.value(field).and_then(ReadingValue::as_number)
    }

    pub fn text(&self, field: LogicalField) -> Option<&str> {
        self.value(field).and_then(ReadingValue::as_text)
    }

    /// Fields that succeeded, in table order of [`LogicalField`]
    pub fn successful_fields(&self) -> impl Iterator<Item = LogicalField> + '_ {
        self.records
            .iter()
            .filter(|(_, record)| record.success)
            .map(|(field, _)| *field)
    }

    pub fn failures(&self) -> impl Iterator<Item = (LogicalField, &ReadingRecord)> + '_ {
        self.records
            .iter()
            .filter(|(_, record)| !record.success)
            .map(|(field, record)| (*field, record))
    }

    /// How the link failed, when any field failed on a dropped or silent link
    ///
    /// A dropped connection outranks a timeout.
    pub fn link_failure(&self) -> Option<ErrorKind> {
        let mut found = None;
        for kind in self.failures().filter_map(|(_, record)| record.error_kind) {
            match kind {
                ErrorKind::Connection => return Some(ErrorKind::Connection),
                ErrorKind::Timeout => found = Some(ErrorKind::Timeout),
                _ => {}
            }
        }
        found
    }

    pub fn is_complete(&self) -> bool {
        self.records.values().all(|record| record.success)
    }
}

/// Active energy total plus its four tariff registers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TouEnergy {
    pub total: f64,
    pub tou1: f64,
    pub tou2: f64,
    pub tou3: f64,
    pub tou4: f64,
}

/// Per-phase quantity; single-phase meters only report L1
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseValues {
    pub l1: f64,
    pub l2: Option<f64>,
    pub l3: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerValues {
    pub active: f64,
    pub reactive: f64,
    pub apparent: f64,
    pub power_factor: f64,
}

/// Power quality counters; `None` where the meter does not keep the counter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerQuality {
    pub short_power_failures: Option<u64>,
    pub long_power_failures: Option<u64>,
    pub voltage_sags: Option<u64>,
    pub voltage_swells: Option<u64>,
}

/// Relay command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    Connect,
    Disconnect,
}

impl RelayAction {
    /// Disconnect control method: `remote_reconnect` (1) or `remote_disconnect` (2)
    pub fn method_id(&self) -> u8 {
        match self {
            RelayAction::Connect => 1,
            RelayAction::Disconnect => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayAction::Connect => "connect",
            RelayAction::Disconnect => "disconnect",
        }
    }
}
