//! Core types shared by every layer of the head-end protocol engine
//!
//! This crate holds the error taxonomy, OBIS addressing, the self-describing
//! DLMS value model, COSEM date/time types and the scaler/unit model used to
//! normalize register readings.

pub mod brand;
pub mod datatypes;
pub mod error;
pub mod obis_code;

pub use brand::MeterBrand;
pub use datatypes::*;
pub use error::{DlmsError, DlmsResult, ErrorKind};
pub use obis_code::ObisCode;
