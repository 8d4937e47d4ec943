//! Brand drivers
//!
//! A [`MeterDriver`] maps logical readings (energy, voltage, clock, relay, ...)
//! onto the COSEM objects of one meter brand and runs them over any
//! [`CosemConnection`](hes_client::CosemConnection). Values leave this crate
//! scaled; failures leave it as records with an error string.
//!
//! ```no_run
//! use hes_client::{MeterDriverConfig, MeterSession};
//! use hes_driver::create_driver;
//! use std::sync::Arc;
//!
//! # async fn run() -> hes_core::DlmsResult<()> {
//! let config = MeterDriverConfig::builder("10.0.0.7").build()?;
//! let brand = config.brand;
//! let session = Arc::new(MeterSession::tcp(config)?);
//! session.open().await?;
//!
//! let driver = create_driver(brand, session.clone());
//! let reading = driver.read_all_data().await;
//! println!("{:?}", reading.number(hes_driver::LogicalField::TotalActiveEnergy));
//! session.release().await;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod factory;
pub mod field;
pub mod hexcell;
pub mod hexing;
pub mod reading;

pub use driver::{DriverCore, MeterDriver};
pub use factory::create_driver;
pub use field::{FieldObject, LogicalField, ValueKind, CLOCK_OBIS, RELAY_OBIS};
pub use hexcell::{HexcellMeterDriver, HEXCELL_OBJECTS};
pub use hexing::{HexingMeterDriver, HEXING_OBJECTS};
pub use reading::{
    MeterReading, PhaseValues, PowerQuality, PowerValues, ReadingRecord, ReadingValue,
    RelayAction, TouEnergy,
};
