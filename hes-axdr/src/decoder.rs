//! A-XDR decoder

use crate::length::decode_length;
use hes_core::{
    BitString, CosemDate, CosemDateTime, CosemTime, DataType, DlmsError, DlmsResult, DlmsValue,
};

/// Nesting limit for arrays and structures
const MAX_DEPTH: usize = 16;

/// Cursor over an encoded buffer
pub struct AxdrDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> AxdrDecoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Decoder positioned at `offset`
    pub fn at(buffer: &'a [u8], offset: usize) -> DlmsResult<Self> {
        if offset > buffer.len() {
            return Err(DlmsError::protocol(format!(
                "Offset {} is past the end of a {}-byte buffer",
                offset,
                buffer.len()
            )));
        }
        Ok(Self {
            buffer,
            position: offset,
        })
    }

    /// Decode the next value, dispatching on its type tag
    pub fn decode_value(&mut self) -> DlmsResult<DlmsValue> {
        self.decode_nested(0)
    }

    fn decode_nested(&mut self, depth: usize) -> DlmsResult<DlmsValue> {
        let data_type = DataType::from_tag(self.read_u8()?)?;
        let value = match data_type {
            DataType::NullData => DlmsValue::Null,
            DataType::Boolean => DlmsValue::Boolean(self.read_u8()? != 0),
            DataType::BitString => {
                let (num_bits, consumed) = decode_length(self.rest())?;
                self.position += consumed;
                let bytes = self.read_bytes(num_bits.div_ceil(8))?.to_vec();
                DlmsValue::BitString(BitString::new(bytes, num_bits)?)
            }
            DataType::Integer => DlmsValue::Integer8(self.read_u8()? as i8),
            DataType::Long => DlmsValue::Integer16(i16::from_be_bytes(self.read_array()?)),
            DataType::DoubleLong => DlmsValue::Integer32(i32::from_be_bytes(self.read_array()?)),
            DataType::Long64 => DlmsValue::Integer64(i64::from_be_bytes(self.read_array()?)),
            DataType::Unsigned => DlmsValue::Unsigned8(self.read_u8()?),
            DataType::LongUnsigned => DlmsValue::Unsigned16(u16::from_be_bytes(self.read_array()?)),
            DataType::DoubleLongUnsigned => {
                DlmsValue::Unsigned32(u32::from_be_bytes(self.read_array()?))
            }
            DataType::Long64Unsigned => {
                DlmsValue::Unsigned64(u64::from_be_bytes(self.read_array()?))
            }
            DataType::Enum => DlmsValue::Enum(self.read_u8()?),
            DataType::Bcd => DlmsValue::Bcd(self.read_u8()?),
            DataType::Float32 => DlmsValue::Float32(f32::from_be_bytes(self.read_array()?)),
            DataType::Float64 => DlmsValue::Float64(f64::from_be_bytes(self.read_array()?)),
            DataType::OctetString => DlmsValue::OctetString(self.read_octet_string()?),
            DataType::VisibleString => DlmsValue::VisibleString(self.read_octet_string()?),
            DataType::Utf8String => DlmsValue::Utf8String(self.read_octet_string()?),
            DataType::DateTime => {
                DlmsValue::DateTime(CosemDateTime::decode(self.read_bytes(CosemDateTime::LENGTH)?)?)
            }
            DataType::Date => DlmsValue::Date(CosemDate::decode(self.read_bytes(CosemDate::LENGTH)?)?),
            DataType::Time => DlmsValue::Time(CosemTime::decode(self.read_bytes(CosemTime::LENGTH)?)?),
            DataType::Array | DataType::Structure => {
                if depth >= MAX_DEPTH {
                    return Err(DlmsError::protocol(format!(
                        "Value nesting deeper than {} levels",
                        MAX_DEPTH
                    )));
                }
                let (count, consumed) = decode_length(self.rest())?;
                self.position += consumed;
                // Each element needs at least its tag byte.
                if count > self.remaining() {
                    return Err(DlmsError::protocol(format!(
                        "Truncated data: {} elements announced, {} bytes left",
                        count,
                        self.remaining()
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.decode_nested(depth + 1)?);
                }
                if data_type == DataType::Array {
                    DlmsValue::Array(items)
                } else {
                    DlmsValue::Structure(items)
                }
            }
            DataType::CompactArray => {
                return Err(DlmsError::Format(
                    "Compact arrays are not supported".to_string(),
                ))
            }
        };
        Ok(value)
    }

    /// Length-prefixed bytes without a tag
    pub fn read_octet_string(&mut self) -> DlmsResult<Vec<u8>> {
        let (len, consumed) = decode_length(self.rest())?;
        self.position += consumed;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_u8(&mut self) -> DlmsResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> DlmsResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> DlmsResult<&'a [u8]> {
        let buffer = self.buffer;
        let end = self.position + len;
        let bytes = buffer.get(self.position..end).ok_or_else(|| {
            DlmsError::protocol(format!(
                "Truncated data: need {} bytes, have {}",
                len,
                self.remaining()
            ))
        })?;
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> DlmsResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        let buffer = self.buffer;
        &buffer[self.position..]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};
    use hes_core::{ErrorKind, ScaledValue};

    #[test]
    fn test_decode_at_offset() {
        let bytes = [0xC4, 0x01, 0xC1, 0x00, 0x12, 0x08, 0xFC, 0xEE];
        let (value, consumed) = decode(&bytes, 4).unwrap();
        assert_eq!(value, DlmsValue::Unsigned16(2300));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_decode_unknown_tag_is_format_error() {
        let err = decode(&[0x07, 0x00], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_decode_truncated_is_protocol_error() {
        for bytes in [
            &[0x06, 0x00, 0x00][..],
            &[0x09, 0x05, 0x01, 0x02],
            &[0x19, 0x07, 0xE8],
            &[0x02, 0x02, 0x11],
            &[0x01, 0x7F],
        ] {
            let err = decode(bytes, 0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Protocol, "{:02X?}", bytes);
        }
    }

    #[test]
    fn test_decode_boolean_any_non_zero() {
        assert_eq!(decode(&[0x03, 0x01], 0).unwrap().0, DlmsValue::Boolean(true));
        assert_eq!(decode(&[0x03, 0x00], 0).unwrap().0, DlmsValue::Boolean(false));
    }

    #[test]
    fn test_round_trip_supported_types() {
        let values = [
            DlmsValue::Unsigned8(0xAB),
            DlmsValue::Unsigned16(0xBEEF),
            DlmsValue::Unsigned32(0xDEADBEEF),
            DlmsValue::OctetString(b"HXE31012345".to_vec()),
            DlmsValue::VisibleString(b"V1.02".to_vec()),
            DlmsValue::DateTime(CosemDateTime::decode(&[
                0x07, 0xE8, 0x03, 0x0F, 0x05, 0x0A, 0x1E, 0x00, 0xFF, 0xFE, 0x20, 0x00,
            ])
            .unwrap()),
            DlmsValue::Array(vec![
                DlmsValue::Integer64(-1),
                DlmsValue::Structure(vec![DlmsValue::Null, DlmsValue::Float64(2.5)]),
            ]),
        ];
        for value in values {
            let bytes = encode(&value);
            let (decoded, consumed) = decode(&bytes, 0).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_decode_scaled_register() {
        let bytes = [
            0x02, 0x02, 0x06, 0x00, 0x00, 0x30, 0x39, 0x02, 0x02, 0x11, 0xFE, 0x16, 0x1E,
        ];
        let (value, _) = decode(&bytes, 0).unwrap();
        let scaled = ScaledValue::from_structure(&value).unwrap();
        assert_eq!(scaled.scaler, Some(-2));
        assert_eq!(scaled.actual_value(), 123.45);
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes = Vec::new();
        for _ in 0..=MAX_DEPTH {
            bytes.extend_from_slice(&[0x01, 0x01]);
        }
        bytes.push(0x00);
        let err = decode(&bytes, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
