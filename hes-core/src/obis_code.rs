use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// OBIS (Object Identification System) code for identifying COSEM objects
///
/// OBIS codes are 6-byte identifiers. The canonical text form is
/// `A-B:C.D.E.F`, e.g. `1-0:15.8.0.255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Create a new OBIS code from its six groups
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    /// Parse an OBIS code from text
    ///
    /// Supports:
    /// - canonical `1-0:1.8.0.255`
    /// - compact hex `0100010800FF` as found in vendor OBIS lists
    pub fn parse(s: &str) -> DlmsResult<Self> {
        let s = s.trim();
        if s.contains('-') || s.contains(':') || s.contains('.') {
            Self::parse_canonical(s)
        } else {
            Self::parse_hex(s)
        }
    }

    fn parse_canonical(s: &str) -> DlmsResult<Self> {
        let (a, rest) = s
            .split_once('-')
            .ok_or_else(|| DlmsError::Format(format!("Invalid OBIS code '{}': missing '-'", s)))?;
        let (b, rest) = rest
            .split_once(':')
            .ok_or_else(|| DlmsError::Format(format!("Invalid OBIS code '{}': missing ':'", s)))?;

        let groups: Vec<&str> = std::iter::once(a)
            .chain(std::iter::once(b))
            .chain(rest.split('.'))
            .collect();
        if groups.len() != 6 {
            return Err(DlmsError::Format(format!(
                "Invalid OBIS code '{}': expected 6 groups, got {}",
                s,
                groups.len()
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, group) in groups.iter().enumerate() {
            if group.is_empty() || !group.bytes().all(|c| c.is_ascii_digit()) {
                return Err(DlmsError::Format(format!(
                    "Invalid OBIS group '{}' in '{}'",
                    group, s
                )));
            }
            bytes[i] = group.parse::<u8>().map_err(|_| {
                DlmsError::Format(format!("Invalid OBIS group '{}' in '{}'", group, s))
            })?;
        }
        Ok(Self { bytes })
    }

    fn parse_hex(s: &str) -> DlmsResult<Self> {
        if s.len() != 12 || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(DlmsError::Format(format!(
                "Invalid OBIS code '{}': expected 12 hex digits",
                s
            )));
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &s[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| DlmsError::Format(format!("Invalid hex byte '{}' in '{}'", pair, s)))?;
        }
        Ok(Self { bytes })
    }

    /// Get the OBIS code as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }

    pub fn a(&self) -> u8 {
        self.bytes[0]
    }

    pub fn b(&self) -> u8 {
        self.bytes[1]
    }

    pub fn c(&self) -> u8 {
        self.bytes[2]
    }

    pub fn d(&self) -> u8 {
        self.bytes[3]
    }

    pub fn e(&self) -> u8 {
        self.bytes[4]
    }

    pub fn f(&self) -> u8 {
        self.bytes[5]
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 6]> for ObisCode {
    fn from(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl Serialize for ObisCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObisCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ObisCode::parse(&text).map_err(serde::de::Error::custom)
    }
}
