//! Fleet configuration
//!
//! Loaded from a TOML file with `HES_`-prefixed environment overrides; nested
//! keys use a double underscore (`HES_RETRY__MAX_ATTEMPTS=3`).
//!
//! ```toml
//! batch_size = 5
//!
//! [retry]
//! max_attempts = 2
//! delay_ms = 1000
//!
//! [[meters]]
//! id = "MTR-0001"
//! host = "10.0.0.12"
//! password = "12345678"
//! brand = "hexcell"
//! ```

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use hes_client::MeterDriverConfig;
use hes_core::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const ENV_PREFIX: &str = "HES_";

/// How often the manager retries a failed meter operation
///
/// Only connection, association and timeout failures are retried; a meter
/// that answers with an error is not asked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// One meter of the static directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterEntry {
    pub id: String,
    #[serde(flatten)]
    pub connection: MeterDriverConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Meters read concurrently by `read_multiple_meters`
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub meters: Vec<MeterEntry>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            meters: Vec::new(),
        }
    }
}

impl FleetConfig {
    /// Defaults, then `path`, then `HES_*` environment variables
    pub fn load(path: impl AsRef<Path>) -> DlmsResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(|e| {
            DlmsError::Format(format!("Failed to load fleet configuration: {}", e))
        })
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(FleetConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
