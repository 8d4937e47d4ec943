//! Meter connection configuration
//!
//! ```toml
//! host = "10.0.0.12"
//! port = 4059
//! client_address = 16
//! password = "12345678"
//! timeout_ms = 30000
//! brand = "hexcell"
//! ```

use hes_core::{DlmsResult, MeterBrand};
use hes_session::HdlcAddress;
use hes_transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4059;
pub const DEFAULT_CLIENT_ADDRESS: u8 = 16;
pub const DEFAULT_SERVER_ADDRESS: u16 = 1;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Everything needed to open a session to one meter
///
/// Per-phase timeouts fall back to `timeout_ms` when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterDriverConfig {
    pub host: String,
    pub port: u16,
    /// Client SAP placed in the HDLC source address
    pub client_address: u8,
    pub server_logical_address: u16,
    pub server_physical_address: Option<u16>,
    /// Low level security password; no authentication when absent
    pub password: Option<String>,
    /// High level security key, carried for the meter record only
    pub authentication_key: Option<String>,
    pub timeout_ms: u64,
    pub connect_timeout_ms: Option<u64>,
    pub link_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub brand: MeterBrand,
}

impl Default for MeterDriverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            client_address: DEFAULT_CLIENT_ADDRESS,
            server_logical_address: DEFAULT_SERVER_ADDRESS,
            server_physical_address: None,
            password: None,
            authentication_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: None,
            link_timeout_ms: None,
            request_timeout_ms: None,
            brand: MeterBrand::default(),
        }
    }
}

impl MeterDriverConfig {
    pub fn builder(host: impl Into<String>) -> MeterDriverConfigBuilder {
        MeterDriverConfigBuilder::new(host)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn client_hdlc_address(&self) -> DlmsResult<HdlcAddress> {
        HdlcAddress::client(self.client_address)
    }

    pub fn server_hdlc_address(&self) -> DlmsResult<HdlcAddress> {
        HdlcAddress::server(self.server_logical_address, self.server_physical_address)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(self.timeout_ms))
    }

    /// Deadline for UA after SNRM and for AARE after AARQ
    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms.unwrap_or(self.timeout_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(self.timeout_ms))
    }
}

/// Fluent builder for [`MeterDriverConfig`]
#[derive(Debug, Clone)]
pub struct MeterDriverConfigBuilder {
    config: MeterDriverConfig,
}

impl MeterDriverConfigBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: MeterDriverConfig {
                host: host.into(),
                ..MeterDriverConfig::default()
            },
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn client_address(mut self, address: u8) -> Self {
        self.config.client_address = address;
        self
    }

    pub fn server_address(mut self, logical: u16, physical: Option<u16>) -> Self {
        self.config.server_logical_address = logical;
        self.config.server_physical_address = physical;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn authentication_key(mut self, key: impl Into<String>) -> Self {
        self.config.authentication_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn link_timeout(mut self, timeout: Duration) -> Self {
        self.config.link_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn brand(mut self, brand: MeterBrand) -> Self {
        self.config.brand = brand;
        self
    }

    /// Validates the HDLC addresses before handing out the configuration
    pub fn build(self) -> DlmsResult<MeterDriverConfig> {
        self.config.client_hdlc_address()?;
        self.config.server_hdlc_address()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeterDriverConfig::default();
        assert_eq!(config.port, 4059);
        assert_eq!(config.client_address, 16);
        assert_eq!(config.link_timeout(), Duration::from_secs(30));
        assert_eq!(config.brand, MeterBrand::Hexing);
        assert_eq!(config.client_hdlc_address().unwrap().encode(), vec![0x21]);
        assert_eq!(config.server_hdlc_address().unwrap().encode(), vec![0x03]);
    }

    #[test]
    fn test_builder_overrides() {
        let config = MeterDriverConfig::builder("10.1.1.5")
            .port(4060)
            .password("12345678")
            .timeout(Duration::from_secs(10))
            .request_timeout(Duration::from_millis(2500))
            .brand(MeterBrand::Hexcell)
            .build()
            .unwrap();
        assert_eq!(config.endpoint().to_string(), "10.1.1.5:4060");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.password.as_deref(), Some("12345678"));
    }

    #[test]
    fn test_builder_rejects_bad_address() {
        let result = MeterDriverConfig::builder("meter")
            .server_address(0x4000, None)
            .build();
        assert!(result.is_err());
    }
}
