//! Type tags of the self-describing DLMS data encoding

use crate::error::{DlmsError, DlmsResult};

/// One-byte type tag leading every encoded DLMS value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    NullData = 0x00,
    Array = 0x01,
    Structure = 0x02,
    Boolean = 0x03,
    BitString = 0x04,
    DoubleLong = 0x05,
    DoubleLongUnsigned = 0x06,
    OctetString = 0x09,
    VisibleString = 0x0A,
    Utf8String = 0x0C,
    Bcd = 0x0D,
    Integer = 0x0F,
    Long = 0x10,
    Unsigned = 0x11,
    LongUnsigned = 0x12,
    CompactArray = 0x13,
    Long64 = 0x14,
    Long64Unsigned = 0x15,
    Enum = 0x16,
    Float32 = 0x17,
    Float64 = 0x18,
    DateTime = 0x19,
    Date = 0x1A,
    Time = 0x1B,
}

impl DataType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Map a tag byte to its data type
    ///
    /// # Errors
    ///
    /// Returns `Format` for any byte that is not a known tag.
    pub fn from_tag(tag: u8) -> DlmsResult<Self> {
        let data_type = match tag {
            0x00 => DataType::NullData,
            0x01 => DataType::Array,
            0x02 => DataType::Structure,
            0x03 => DataType::Boolean,
            0x04 => DataType::BitString,
            0x05 => DataType::DoubleLong,
            0x06 => DataType::DoubleLongUnsigned,
            0x09 => DataType::OctetString,
            0x0A => DataType::VisibleString,
            0x0C => DataType::Utf8String,
            0x0D => DataType::Bcd,
            0x0F => DataType::Integer,
            0x10 => DataType::Long,
            0x11 => DataType::Unsigned,
            0x12 => DataType::LongUnsigned,
            0x13 => DataType::CompactArray,
            0x14 => DataType::Long64,
            0x15 => DataType::Long64Unsigned,
            0x16 => DataType::Enum,
            0x17 => DataType::Float32,
            0x18 => DataType::Float64,
            0x19 => DataType::DateTime,
            0x1A => DataType::Date,
            0x1B => DataType::Time,
            other => {
                return Err(DlmsError::Format(format!(
                    "Unknown data type tag 0x{:02X}",
                    other
                )))
            }
        };
        Ok(data_type)
    }

    /// Encoded size of fixed-width types, `None` for length-prefixed ones
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::NullData => Some(0),
            DataType::Boolean
            | DataType::Bcd
            | DataType::Integer
            | DataType::Unsigned
            | DataType::Enum => Some(1),
            DataType::Long | DataType::LongUnsigned => Some(2),
            DataType::DoubleLong | DataType::DoubleLongUnsigned | DataType::Float32 => Some(4),
            DataType::Long64 | DataType::Long64Unsigned | DataType::Float64 => Some(8),
            DataType::DateTime => Some(12),
            DataType::Date => Some(5),
            DataType::Time => Some(4),
            DataType::Array
            | DataType::Structure
            | DataType::BitString
            | DataType::OctetString
            | DataType::VisibleString
            | DataType::Utf8String
            | DataType::CompactArray => None,
        }
    }
}
