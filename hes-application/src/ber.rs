//! Minimal BER TLV reader/writer for the ACSE association PDUs

use hes_core::{DlmsError, DlmsResult};

/// One tag-length-value element borrowed from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Sequential reader over concatenated TLVs
pub(crate) struct BerReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn read_byte(&mut self) -> DlmsResult<u8> {
        let byte = *self
            .buffer
            .get(self.position)
            .ok_or_else(|| DlmsError::protocol("BER element truncated"))?;
        self.position += 1;
        Ok(byte)
    }

    /// Short form, or long form with one or two length octets
    fn read_length(&mut self) -> DlmsResult<usize> {
        let first = self.read_byte()?;
        match first {
            0x00..=0x7F => Ok(first as usize),
            0x81 => Ok(self.read_byte()? as usize),
            0x82 => {
                let high = self.read_byte()? as usize;
                let low = self.read_byte()? as usize;
                Ok((high << 8) | low)
            }
            other => Err(DlmsError::protocol(format!(
                "Unsupported BER length form 0x{:02X}",
                other
            ))),
        }
    }

    pub fn read_tlv(&mut self) -> DlmsResult<Tlv<'a>> {
        let tag = self.read_byte()?;
        let len = self.read_length()?;
        let buffer = self.buffer;
        let end = self.position + len;
        if end > buffer.len() {
            return Err(DlmsError::protocol(format!(
                "BER element 0x{:02X} declares {} bytes, only {} available",
                tag,
                len,
                buffer.len() - self.position
            )));
        }
        let value = &buffer[self.position..end];
        self.position = end;
        Ok(Tlv { tag, value })
    }
}

/// Append `tag | length | value` using the short length form where possible
pub(crate) fn write_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    write_length(out, value.len());
    out.extend_from_slice(value);
}

pub(crate) fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_nested_tlvs() {
        let data = [0xA2, 0x03, 0x02, 0x01, 0x00, 0xA3, 0x05, 0xA1, 0x03, 0x02, 0x01, 0x0D];
        let mut reader = BerReader::new(&data);
        let result = reader.read_tlv().unwrap();
        assert_eq!(result.tag, 0xA2);
        assert_eq!(result.value, &[0x02, 0x01, 0x00]);
        let diagnostic = reader.read_tlv().unwrap();
        assert_eq!(diagnostic.tag, 0xA3);
        assert!(!reader.has_remaining());

        let inner = BerReader::new(diagnostic.value).read_tlv().unwrap();
        assert_eq!(inner.tag, 0xA1);
    }

    #[test]
    fn test_truncated_tlv_is_protocol_error() {
        let err = BerReader::new(&[0xA2, 0x05, 0x02]).read_tlv().unwrap_err();
        assert_eq!(err.kind(), hes_core::ErrorKind::Protocol);
    }

    #[test]
    fn test_long_form_length() {
        let mut out = Vec::new();
        write_tlv(&mut out, 0x04, &[0u8; 200]);
        assert_eq!(&out[..3], &[0x04, 0x81, 200]);
        let tlv = BerReader::new(&out).read_tlv().unwrap();
        assert_eq!(tlv.value.len(), 200);
    }
}
