//! Meter id → connection settings

use crate::config::MeterEntry;
use async_trait::async_trait;
use hes_client::MeterDriverConfig;
use hes_core::DlmsResult;
use std::collections::HashMap;

/// Source of per-meter connection settings
///
/// `Ok(None)` means the meter is unknown; `Err` means the directory itself
/// could not be consulted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeterDirectory: Send + Sync {
    async fn lookup(&self, meter_id: &str) -> DlmsResult<Option<MeterDriverConfig>>;
}

/// Directory held in memory, usually built from [`FleetConfig`](crate::FleetConfig)
#[derive(Debug, Clone, Default)]
pub struct StaticMeterDirectory {
    meters: HashMap<String, MeterDriverConfig>,
}

impl StaticMeterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meter(mut self, meter_id: impl Into<String>, config: MeterDriverConfig) -> Self {
        self.insert(meter_id, config);
        self
    }

    pub fn insert(&mut self, meter_id: impl Into<String>, config: MeterDriverConfig) {
        self.meters.insert(meter_id.into(), config);
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }
}

impl FromIterator<MeterEntry> for StaticMeterDirectory {
    fn from_iter<I: IntoIterator<Item = MeterEntry>>(entries: I) -> Self {
        Self {
            meters: entries
                .into_iter()
                .map(|entry| (entry.id, entry.connection))
                .collect(),
        }
    }
}

#[async_trait]
impl MeterDirectory for StaticMeterDirectory {
    async fn lookup(&self, meter_id: &str) -> DlmsResult<Option<MeterDriverConfig>> {
        Ok(self.meters.get(meter_id).cloned())
    }
}
