//! Bit string type

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arbitrary string of bits, most significant bit of the first byte first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitString {
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a bit string
    ///
    /// # Errors
    ///
    /// Returns `Format` if `bytes` is too short to hold `num_bits` bits.
    pub fn new(bytes: Vec<u8>, num_bits: usize) -> DlmsResult<Self> {
        if num_bits > bytes.len() * 8 {
            return Err(DlmsError::Format(format!(
                "Bit string needs {} bytes for {} bits, got {}",
                num_bits.div_ceil(8),
                num_bits,
                bytes.len()
            )));
        }
        Ok(Self { bytes, num_bits })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Bit at `index`, `None` past the end
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.num_bits {
            return None;
        }
        let byte = self.bytes[index / 8];
        Some(byte & (0x80 >> (index % 8)) != 0)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.num_bits {
            let set = self.bit(i).unwrap_or(false);
            write!(f, "{}", if set { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_bits() {
        let bits = BitString::new(vec![0b1010_0000], 4).unwrap();
        assert_eq!(bits.bit(0), Some(true));
        assert_eq!(bits.bit(1), Some(false));
        assert_eq!(bits.bit(2), Some(true));
        assert_eq!(bits.bit(4), None);
        assert_eq!(bits.to_string(), "1010");
    }

    #[test]
    fn test_bit_string_too_short() {
        assert!(BitString::new(vec![0xFF], 9).is_err());
    }
}
