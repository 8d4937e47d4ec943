//! HDLC address encoding
//!
//! Each address byte carries seven bits of the value shifted left by one;
//! the low bit marks the final byte of the address.

use hes_core::{DlmsError, DlmsResult};
use std::fmt;

const ONE_BYTE_UPPER_BOUND: u16 = 0x7F;
const TWO_BYTE_UPPER_BOUND: u16 = 0x3FFF;

/// HDLC station address
///
/// Clients use a single-byte SAP. Servers use an upper (logical device)
/// address and, optionally, a lower (physical device) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HdlcAddress {
    upper: u16,
    lower: Option<u16>,
}

impl HdlcAddress {
    /// Client SAP, e.g. 16 for the public client
    pub fn client(sap: u8) -> DlmsResult<Self> {
        if sap as u16 > ONE_BYTE_UPPER_BOUND {
            return Err(DlmsError::Format(format!(
                "Client address {} exceeds upper bound {}",
                sap, ONE_BYTE_UPPER_BOUND
            )));
        }
        Ok(Self {
            upper: sap as u16,
            lower: None,
        })
    }

    /// Server address with an optional physical device address
    pub fn server(logical: u16, physical: Option<u16>) -> DlmsResult<Self> {
        for value in std::iter::once(logical).chain(physical) {
            if value > TWO_BYTE_UPPER_BOUND {
                return Err(DlmsError::Format(format!(
                    "Server address 0x{:X} exceeds upper bound 0x{:X}",
                    value, TWO_BYTE_UPPER_BOUND
                )));
            }
        }
        Ok(Self {
            upper: logical,
            lower: physical,
        })
    }

    pub fn upper(&self) -> u16 {
        self.upper
    }

    pub fn lower(&self) -> Option<u16> {
        self.lower
    }

    /// Number of bytes on the wire: 1, 2 or 4
    pub fn byte_length(&self) -> usize {
        match self.lower {
            None if self.upper <= ONE_BYTE_UPPER_BOUND => 1,
            None => 2,
            Some(lower) if self.upper <= ONE_BYTE_UPPER_BOUND && lower <= ONE_BYTE_UPPER_BOUND => 2,
            Some(_) => 4,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = match (self.byte_length(), self.lower) {
            (1, _) => vec![(self.upper as u8) << 1],
            (2, None) => split_two(self.upper).to_vec(),
            (2, Some(lower)) => vec![(self.upper as u8) << 1, (lower as u8) << 1],
            (_, lower) => {
                let mut bytes = split_two(self.upper).to_vec();
                bytes.extend_from_slice(&split_two(lower.unwrap_or(0)));
                bytes
            }
        };
        if let Some(last) = out.last_mut() {
            *last |= 0x01;
        }
        out
    }

    /// Read an address from the front of `data`, returning it and its length
    pub fn decode(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let length = data
            .iter()
            .take(4)
            .position(|b| b & 0x01 == 0x01)
            .map(|i| i + 1)
            .ok_or_else(|| DlmsError::protocol("HDLC address has no terminating byte"))?;

        let values: Vec<u16> = data[..length].iter().map(|b| (b >> 1) as u16).collect();
        let address = match length {
            1 => Self {
                upper: values[0],
                lower: None,
            },
            2 => Self {
                upper: values[0],
                lower: Some(values[1]),
            },
            4 => Self {
                upper: (values[0] << 7) | values[1],
                lower: Some((values[2] << 7) | values[3]),
            },
            other => {
                return Err(DlmsError::protocol(format!(
                    "HDLC address has invalid length {}",
                    other
                )))
            }
        };
        Ok((address, length))
    }
}

fn split_two(value: u16) -> [u8; 2] {
    [((value >> 7) as u8 & 0x7F) << 1, (value as u8 & 0x7F) << 1]
}

impl fmt::Display for HdlcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lower {
            Some(lower) => write!(f, "{}/{}", self.upper, lower),
            None => write!(f, "{}", self.upper),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_address() {
        let addr = HdlcAddress::client(16).unwrap();
        assert_eq!(addr.encode(), [0x21]);
        assert!(HdlcAddress::client(0x80).is_err());
    }

    #[test]
    fn test_server_address_forms() {
        assert_eq!(HdlcAddress::server(1, None).unwrap().encode(), [0x03]);
        assert_eq!(HdlcAddress::server(1, Some(17)).unwrap().encode(), [0x02, 0x23]);
        let wide = HdlcAddress::server(1, Some(0x1234)).unwrap();
        assert_eq!(wide.byte_length(), 4);
        let encoded = wide.encode();
        assert_eq!(HdlcAddress::decode(&encoded).unwrap(), (wide, 4));
    }

    #[test]
    fn test_decode_with_trailing_bytes() {
        let (addr, len) = HdlcAddress::decode(&[0x02, 0x23, 0x21, 0x93]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(addr, HdlcAddress::server(1, Some(17)).unwrap());
        assert!(HdlcAddress::decode(&[0x02, 0x02, 0x02, 0x02, 0x03]).is_err());
        assert!(HdlcAddress::decode(&[0x02, 0x02, 0x03]).is_err());
    }
}
