//! Frame Check Sequence (CRC-16/X.25) for HDLC

const INITIAL_FCS: u16 = 0xFFFF;
const GOOD_FCS: u16 = 0xF0B8;
const KEY: u16 = 0x8408; // Bit-reversed 0x1021

static FCS_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = b as u16;
        for _ in 0..8 {
            v = if v & 1 == 1 { (v >> 1) ^ KEY } else { v >> 1 };
        }
        *entry = v;
    }
    table
});

/// Running FCS calculator
#[derive(Debug, Clone)]
pub struct FcsCalc {
    fcs_value: u16,
}

impl FcsCalc {
    pub fn new() -> Self {
        Self {
            fcs_value: INITIAL_FCS,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.fcs_value =
                (self.fcs_value >> 8) ^ FCS_TABLE[((self.fcs_value ^ byte as u16) & 0xFF) as usize];
        }
    }

    /// Check sequence as transmitted on the wire (complemented, low byte first)
    pub fn fcs_value_bytes(&self) -> [u8; 2] {
        (self.fcs_value ^ 0xFFFF).to_le_bytes()
    }

    /// True once the data and its trailing check bytes have been fed in
    pub fn is_valid(&self) -> bool {
        self.fcs_value == GOOD_FCS
    }
}

impl Default for FcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Check sequence bytes for `data`
pub fn fcs16(data: &[u8]) -> [u8; 2] {
    let mut calc = FcsCalc::new();
    calc.update(data);
    calc.fcs_value_bytes()
}

/// True if `data` ends with a valid check sequence over the bytes before it
pub fn verify(data_with_fcs: &[u8]) -> bool {
    let mut calc = FcsCalc::new();
    calc.update(data_with_fcs);
    calc.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_x25_check_value() {
        // Standard check value for "123456789"
        assert_eq!(fcs16(b"123456789"), 0x906Eu16.to_le_bytes());
    }

    #[test]
    fn test_verify_appended_fcs() {
        let header = [0xA0, 0x07, 0x03, 0x21, 0x93];
        let mut frame = header.to_vec();
        frame.extend_from_slice(&fcs16(&header));
        assert!(verify(&frame));
        frame[2] ^= 0x01;
        assert!(!verify(&frame));
    }
}
