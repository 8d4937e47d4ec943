//! Logical-name object references

use bytes::BufMut;
use hes_axdr::AxdrDecoder;
use hes_core::{DlmsResult, ObisCode};
use std::fmt;

fn read_obis(decoder: &mut AxdrDecoder<'_>) -> DlmsResult<ObisCode> {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(decoder.read_bytes(6)?);
    Ok(ObisCode::from_bytes(bytes))
}

/// Attribute reference: class id, OBIS instance, attribute id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemAttributeDescriptor {
    pub class_id: u16,
    pub instance: ObisCode,
    pub attribute_id: u8,
}

impl CosemAttributeDescriptor {
    pub fn new(class_id: u16, instance: ObisCode, attribute_id: u8) -> Self {
        Self {
            class_id,
            instance,
            attribute_id,
        }
    }

    /// `class(2) | obis(6) | attribute(1)`
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.class_id);
        buf.put_slice(self.instance.as_bytes());
        buf.put_u8(self.attribute_id);
    }

    pub fn decode(decoder: &mut AxdrDecoder<'_>) -> DlmsResult<Self> {
        let class_id = decoder.read_u16()?;
        let instance = read_obis(decoder)?;
        let attribute_id = decoder.read_u8()?;
        Ok(Self::new(class_id, instance, attribute_id))
    }
}

impl fmt::Display for CosemAttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.class_id, self.instance, self.attribute_id)
    }
}

/// Method reference: class id, OBIS instance, method id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemMethodDescriptor {
    pub class_id: u16,
    pub instance: ObisCode,
    pub method_id: u8,
}

impl CosemMethodDescriptor {
    pub fn new(class_id: u16, instance: ObisCode, method_id: u8) -> Self {
        Self {
            class_id,
            instance,
            method_id,
        }
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.class_id);
        buf.put_slice(self.instance.as_bytes());
        buf.put_u8(self.method_id);
    }

    pub fn decode(decoder: &mut AxdrDecoder<'_>) -> DlmsResult<Self> {
        let class_id = decoder.read_u16()?;
        let instance = read_obis(decoder)?;
        let method_id = decoder.read_u8()?;
        Ok(Self::new(class_id, instance, method_id))
    }
}

impl fmt::Display for CosemMethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/m{}", self.class_id, self.instance, self.method_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_descriptor_wire_form() {
        let descriptor = CosemAttributeDescriptor::new(3, ObisCode::new(1, 0, 32, 7, 0, 255), 2);
        let mut buf = Vec::new();
        descriptor.encode_into(&mut buf);
        assert_eq!(buf, vec![0x00, 0x03, 0x01, 0x00, 0x20, 0x07, 0x00, 0xFF, 0x02]);

        let decoded = CosemAttributeDescriptor::decode(&mut AxdrDecoder::new(&buf)).unwrap();
        assert_eq!(decoded, descriptor);
        assert_eq!(decoded.to_string(), "3/1-0:32.7.0.255/2");
    }

    #[test]
    fn test_truncated_descriptor() {
        let err = CosemMethodDescriptor::decode(&mut AxdrDecoder::new(&[0x00, 0x46, 0x00])).unwrap_err();
        assert_eq!(err.kind(), hes_core::ErrorKind::Protocol);
    }
}
