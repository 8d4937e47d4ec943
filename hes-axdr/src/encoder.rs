//! A-XDR encoder

use crate::length::encode_length;
use hes_core::{BitString, DataType, DlmsValue};

/// Accumulates encoded values into a byte buffer
#[derive(Debug, Default)]
pub struct AxdrEncoder {
    buffer: Vec<u8>,
}

impl AxdrEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value, tag first
    pub fn encode_value(&mut self, value: &DlmsValue) {
        self.buffer.push(value.data_type().tag());
        match value {
            DlmsValue::Null => {}
            DlmsValue::Boolean(b) => self.buffer.push(if *b { 0xFF } else { 0x00 }),
            DlmsValue::BitString(bits) => self.encode_bit_string(bits),
            DlmsValue::Integer8(v) => self.buffer.push(*v as u8),
            DlmsValue::Integer16(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Integer32(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Integer64(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Unsigned8(v) | DlmsValue::Enum(v) | DlmsValue::Bcd(v) => {
                self.buffer.push(*v)
            }
            DlmsValue::Unsigned16(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Unsigned32(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Unsigned64(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Float32(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::Float64(v) => self.buffer.extend_from_slice(&v.to_be_bytes()),
            DlmsValue::OctetString(bytes)
            | DlmsValue::VisibleString(bytes)
            | DlmsValue::Utf8String(bytes) => self.encode_octet_string(bytes),
            DlmsValue::DateTime(dt) => self.buffer.extend_from_slice(&dt.encode()),
            DlmsValue::Date(d) => self.buffer.extend_from_slice(&d.encode()),
            DlmsValue::Time(t) => self.buffer.extend_from_slice(&t.encode()),
            DlmsValue::Array(items) | DlmsValue::Structure(items) => {
                encode_length(items.len(), &mut self.buffer);
                for item in items {
                    self.encode_value(item);
                }
            }
        }
    }

    /// Length-prefixed bytes without a tag
    pub fn encode_octet_string(&mut self, bytes: &[u8]) {
        encode_length(bytes.len(), &mut self.buffer);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_bit_string(&mut self, bits: &BitString) {
        encode_length(bits.num_bits(), &mut self.buffer);
        let num_bytes = bits.num_bits().div_ceil(8);
        self.buffer.extend_from_slice(&bits.as_bytes()[..num_bytes]);
    }

    /// Raw bytes, for callers composing APDUs around encoded values
    pub fn encode_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Tag without a body, e.g. the octet-string tag before a pre-encoded clock
    pub fn encode_tag(&mut self, data_type: DataType) {
        self.buffer.push(data_type.tag());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_core::{CosemDate, CosemDateTime, CosemTime};

    fn encoded(value: DlmsValue) -> Vec<u8> {
        let mut encoder = AxdrEncoder::new();
        encoder.encode_value(&value);
        encoder.into_bytes()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encoded(DlmsValue::Null), [0x00]);
        assert_eq!(encoded(DlmsValue::Boolean(true)), [0x03, 0xFF]);
        assert_eq!(encoded(DlmsValue::Integer32(0x12345678)), [0x05, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(encoded(DlmsValue::Unsigned32(12345)), [0x06, 0x00, 0x00, 0x30, 0x39]);
        assert_eq!(encoded(DlmsValue::Integer8(-2)), [0x0F, 0xFE]);
        assert_eq!(encoded(DlmsValue::Enum(30)), [0x16, 0x1E]);
        assert_eq!(
            encoded(DlmsValue::Float32(1.0)),
            [0x17, 0x3F, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_strings() {
        assert_eq!(
            encoded(DlmsValue::from("ABC")),
            [0x0A, 0x03, b'A', b'B', b'C']
        );
        assert_eq!(encoded(DlmsValue::OctetString(vec![])), [0x09, 0x00]);
        let long = encoded(DlmsValue::OctetString(vec![0xAA; 200]));
        assert_eq!(&long[..3], &[0x09, 0x81, 0xC8]);
        assert_eq!(long.len(), 203);
    }

    #[test]
    fn test_encode_bit_string() {
        let bits = BitString::new(vec![0b1010_0000, 0xFF], 4).unwrap();
        assert_eq!(encoded(DlmsValue::BitString(bits)), [0x04, 0x04, 0xA0]);
    }

    #[test]
    fn test_encode_date_time_has_no_length() {
        let dt = CosemDateTime::new(
            CosemDate::new(2024, 3, 15).unwrap(),
            CosemTime::new(10, 30, 0).unwrap(),
            0,
            &[],
        )
        .unwrap();
        let bytes = encoded(DlmsValue::DateTime(dt));
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[0], 0x19);
        assert_eq!(bytes[1], 0x07);
    }

    #[test]
    fn test_encode_scaler_unit_structure() {
        let value = DlmsValue::Structure(vec![
            DlmsValue::Unsigned32(12345),
            DlmsValue::Structure(vec![DlmsValue::Integer8(-2), DlmsValue::Enum(30)]),
        ]);
        assert_eq!(
            encoded(value),
            [
                0x02, 0x02, 0x06, 0x00, 0x00, 0x30, 0x39, 0x02, 0x02, 0x0F, 0xFE, 0x16, 0x1E
            ]
        );
    }
}
