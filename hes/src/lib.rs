//! Smart meter head-end - DLMS/COSEM protocol engine
//!
//! Talks to electricity meters over TCP: HDLC framing, COSEM association,
//! GET/SET/ACTION services, brand drivers that turn OBIS objects into scaled
//! readings, and a fleet manager that reads many meters in bounded batches.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `hes-core`: error taxonomy, OBIS codes, DLMS values, date/time, scaler/unit
//! - `hes-axdr`: A-XDR encoding/decoding of DLMS values
//! - `hes-transport`: transport layer (plain TCP, pluggable connectors)
//! - `hes-session`: HDLC link layer (addresses, frames, FCS/HCS, link parameters)
//! - `hes-application`: application layer (AARQ/AARE, RLRQ/RLRE, GET/SET/ACTION)
//! - `hes-client`: per-meter session state machine
//! - `hes-driver`: Hexing/Hexcell brand drivers
//! - `hes-fleet`: connection manager, fleet configuration, sinks
//! - `hes-simulator`: in-process meter for tests and demos
//!
//! # Implementation Status
//!
//! ## ✅ 已完成
//! - 核心数据类型（DlmsValue, CosemDate/Time/DateTime, ScalerUnit）
//! - A-XDR 编码/解码
//! - HDLC 会话层（地址、帧、FCS、流式解码）
//! - 应用层（AARQ/AARE LLS, GET/SET/ACTION Normal 类型）
//! - 会话状态机（单一待处理请求）
//! - 品牌驱动（Hexing, Hexcell）
//! - 批量抄表（ConnectionManager）
//!
//! ## 🚫 不在范围内
//! - HLS 认证与加密
//! - 块传输（GET WithDataBlock）
//!
//! # Usage
//!
//! ```no_run
//! use hes::fleet::{ConnectionManager, FleetConfig};
//!
//! # async fn run() -> hes::DlmsResult<()> {
//! let config = FleetConfig::load("fleet.toml")?;
//! let manager = ConnectionManager::from_config(&config);
//! let results = manager.read_multiple_meters(&["MTR-0001", "MTR-0002"]).await;
//! for (meter_id, result) in &results {
//!     println!("{}: success={}", meter_id, result.success);
//! }
//! manager.close_all_connections().await;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use hes_core::datatypes::*;
pub use hes_core::{DlmsError, DlmsResult, ErrorKind, MeterBrand, ObisCode};

// Re-export the protocol layers
pub mod axdr {
    pub use hes_axdr::*;
}

pub mod transport {
    pub use hes_transport::*;
}

pub mod session {
    pub use hes_session::*;
}

pub mod application {
    pub use hes_application::*;
}

// Re-export client API
pub mod client {
    pub use hes_client::*;
}

pub mod driver {
    pub use hes_driver::*;
}

pub mod fleet {
    pub use hes_fleet::*;
}

pub mod simulator {
    pub use hes_simulator::*;
}
