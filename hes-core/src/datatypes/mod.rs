//! Data types used by the DLMS/COSEM value model

pub mod bit_string;
pub mod cosem_date;
pub mod cosem_date_time;
pub mod cosem_time;
pub mod data_type;
pub mod scaled_value;
pub mod unit;
pub mod value;

pub use bit_string::BitString;
pub use cosem_date::CosemDate;
pub use cosem_date_time::{ClockStatus, CosemDateTime};
pub use cosem_time::CosemTime;
pub use data_type::DataType;
pub use scaled_value::{apply_scaler, ScaledValue, ScalerUnit};
pub use unit::Unit;
pub use value::DlmsValue;
