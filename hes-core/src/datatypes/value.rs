//! Self-describing DLMS value

use crate::datatypes::bit_string::BitString;
use crate::datatypes::cosem_date::CosemDate;
use crate::datatypes::cosem_date_time::CosemDateTime;
use crate::datatypes::cosem_time::CosemTime;
use crate::datatypes::data_type::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried in GET responses, SET requests and ACTION parameters
///
/// Each variant maps onto exactly one [`DataType`] tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DlmsValue {
    Null,
    Boolean(bool),
    BitString(BitString),
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    OctetString(Vec<u8>),
    VisibleString(Vec<u8>),
    Utf8String(Vec<u8>),
    Bcd(u8),
    Enum(u8),
    Float32(f32),
    Float64(f64),
    DateTime(CosemDateTime),
    Date(CosemDate),
    Time(CosemTime),
    Array(Vec<DlmsValue>),
    Structure(Vec<DlmsValue>),
}

impl DlmsValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DlmsValue::Null => DataType::NullData,
            DlmsValue::Boolean(_) => DataType::Boolean,
            DlmsValue::BitString(_) => DataType::BitString,
            DlmsValue::Integer8(_) => DataType::Integer,
            DlmsValue::Integer16(_) => DataType::Long,
            DlmsValue::Integer32(_) => DataType::DoubleLong,
            DlmsValue::Integer64(_) => DataType::Long64,
            DlmsValue::Unsigned8(_) => DataType::Unsigned,
            DlmsValue::Unsigned16(_) => DataType::LongUnsigned,
            DlmsValue::Unsigned32(_) => DataType::DoubleLongUnsigned,
            DlmsValue::Unsigned64(_) => DataType::Long64Unsigned,
            DlmsValue::OctetString(_) => DataType::OctetString,
            DlmsValue::VisibleString(_) => DataType::VisibleString,
            DlmsValue::Utf8String(_) => DataType::Utf8String,
            DlmsValue::Bcd(_) => DataType::Bcd,
            DlmsValue::Enum(_) => DataType::Enum,
            DlmsValue::Float32(_) => DataType::Float32,
            DlmsValue::Float64(_) => DataType::Float64,
            DlmsValue::DateTime(_) => DataType::DateTime,
            DlmsValue::Date(_) => DataType::Date,
            DlmsValue::Time(_) => DataType::Time,
            DlmsValue::Array(_) => DataType::Array,
            DlmsValue::Structure(_) => DataType::Structure,
        }
    }

    /// Smallest unsigned variant that holds `value`
    pub fn from_unsigned(value: u64) -> Self {
        if let Ok(v) = u8::try_from(value) {
            DlmsValue::Unsigned8(v)
        } else if let Ok(v) = u16::try_from(value) {
            DlmsValue::Unsigned16(v)
        } else if let Ok(v) = u32::try_from(value) {
            DlmsValue::Unsigned32(v)
        } else {
            DlmsValue::Unsigned64(value)
        }
    }

    /// Smallest signed variant that holds `value`
    pub fn from_signed(value: i64) -> Self {
        if let Ok(v) = i8::try_from(value) {
            DlmsValue::Integer8(v)
        } else if let Ok(v) = i16::try_from(value) {
            DlmsValue::Integer16(v)
        } else if let Ok(v) = i32::try_from(value) {
            DlmsValue::Integer32(v)
        } else {
            DlmsValue::Integer64(value)
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Numeric value of any integer, float, enum or BCD variant
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DlmsValue::Integer8(v) => Some(*v as f64),
            DlmsValue::Integer16(v) => Some(*v as f64),
            DlmsValue::Integer32(v) => Some(*v as f64),
            DlmsValue::Integer64(v) => Some(*v as f64),
            DlmsValue::Unsigned8(v) | DlmsValue::Enum(v) | DlmsValue::Bcd(v) => Some(*v as f64),
            DlmsValue::Unsigned16(v) => Some(*v as f64),
            DlmsValue::Unsigned32(v) => Some(*v as f64),
            DlmsValue::Unsigned64(v) => Some(*v as f64),
            DlmsValue::Float32(v) => Some(*v as f64),
            DlmsValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DlmsValue::Integer8(v) => Some(*v as i64),
            DlmsValue::Integer16(v) => Some(*v as i64),
            DlmsValue::Integer32(v) => Some(*v as i64),
            DlmsValue::Integer64(v) => Some(*v),
            DlmsValue::Unsigned8(v) | DlmsValue::Enum(v) | DlmsValue::Bcd(v) => Some(*v as i64),
            DlmsValue::Unsigned16(v) => Some(*v as i64),
            DlmsValue::Unsigned32(v) => Some(*v as i64),
            DlmsValue::Unsigned64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DlmsValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw bytes of an octet, visible or UTF-8 string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DlmsValue::OctetString(v) | DlmsValue::VisibleString(v) | DlmsValue::Utf8String(v) => {
                Some(v)
            }
            _ => None,
        }
    }

    /// Text of a string value; octet strings are read as printable ASCII when they are
    pub fn as_text(&self) -> Option<String> {
        match self {
            DlmsValue::VisibleString(v) | DlmsValue::Utf8String(v) => {
                Some(String::from_utf8_lossy(v).into_owned())
            }
            DlmsValue::OctetString(v) if v.iter().all(|b| b.is_ascii_graphic() || *b == b' ') => {
                Some(String::from_utf8_lossy(v).into_owned())
            }
            _ => None,
        }
    }

    /// Date-time carried either natively or as a 12-byte octet string
    pub fn as_date_time(&self) -> Option<CosemDateTime> {
        match self {
            DlmsValue::DateTime(dt) => Some(*dt),
            DlmsValue::OctetString(v) if v.len() == CosemDateTime::LENGTH => {
                CosemDateTime::decode(v).ok()
            }
            _ => None,
        }
    }

    pub fn as_items(&self) -> Option<&[DlmsValue]> {
        match self {
            DlmsValue::Array(items) | DlmsValue::Structure(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for DlmsValue {
    fn from(value: bool) -> Self {
        DlmsValue::Boolean(value)
    }
}

impl From<u8> for DlmsValue {
    fn from(value: u8) -> Self {
        DlmsValue::Unsigned8(value)
    }
}

impl From<u16> for DlmsValue {
    fn from(value: u16) -> Self {
        DlmsValue::Unsigned16(value)
    }
}

impl From<u32> for DlmsValue {
    fn from(value: u32) -> Self {
        DlmsValue::Unsigned32(value)
    }
}

impl From<u64> for DlmsValue {
    fn from(value: u64) -> Self {
        DlmsValue::Unsigned64(value)
    }
}

impl From<i8> for DlmsValue {
    fn from(value: i8) -> Self {
        DlmsValue::Integer8(value)
    }
}

impl From<i16> for DlmsValue {
    fn from(value: i16) -> Self {
        DlmsValue::Integer16(value)
    }
}

impl From<i32> for DlmsValue {
    fn from(value: i32) -> Self {
        DlmsValue::Integer32(value)
    }
}

impl From<i64> for DlmsValue {
    fn from(value: i64) -> Self {
        DlmsValue::Integer64(value)
    }
}

impl From<f32> for DlmsValue {
    fn from(value: f32) -> Self {
        DlmsValue::Float32(value)
    }
}

impl From<f64> for DlmsValue {
    fn from(value: f64) -> Self {
        DlmsValue::Float64(value)
    }
}

impl From<&str> for DlmsValue {
    fn from(value: &str) -> Self {
        DlmsValue::VisibleString(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for DlmsValue {
    fn from(value: &[u8]) -> Self {
        DlmsValue::OctetString(value.to_vec())
    }
}

impl From<Vec<u8>> for DlmsValue {
    fn from(value: Vec<u8>) -> Self {
        DlmsValue::OctetString(value)
    }
}

impl From<CosemDateTime> for DlmsValue {
    fn from(value: CosemDateTime) -> Self {
        DlmsValue::DateTime(value)
    }
}

impl fmt::Display for DlmsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DlmsValue::Null => f.write_str("null"),
            DlmsValue::Boolean(v) => write!(f, "{}", v),
            DlmsValue::BitString(v) => write!(f, "{}", v),
            DlmsValue::Integer8(v) => write!(f, "{}", v),
            DlmsValue::Integer16(v) => write!(f, "{}", v),
            DlmsValue::Integer32(v) => write!(f, "{}", v),
            DlmsValue::Integer64(v) => write!(f, "{}", v),
            DlmsValue::Unsigned8(v) | DlmsValue::Enum(v) | DlmsValue::Bcd(v) => write!(f, "{}", v),
            DlmsValue::Unsigned16(v) => write!(f, "{}", v),
            DlmsValue::Unsigned32(v) => write!(f, "{}", v),
            DlmsValue::Unsigned64(v) => write!(f, "{}", v),
            DlmsValue::Float32(v) => write!(f, "{}", v),
            DlmsValue::Float64(v) => write!(f, "{}", v),
            DlmsValue::VisibleString(_) | DlmsValue::Utf8String(_) | DlmsValue::OctetString(_) => {
                match self.as_text() {
                    Some(text) => f.write_str(&text),
                    None => {
                        for byte in self.as_bytes().unwrap_or_default() {
                            write!(f, "{:02X}", byte)?;
                        }
                        Ok(())
                    }
                }
            }
            DlmsValue::DateTime(v) => write!(f, "{}", v),
            DlmsValue::Date(v) => write!(f, "{}", v),
            DlmsValue::Time(v) => write!(f, "{}", v),
            DlmsValue::Array(items) | DlmsValue::Structure(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}
