//! COSEM time type

use crate::datatypes::cosem_date::{specified, NOT_SPECIFIED};
use crate::error::{DlmsError, DlmsResult};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// COSEM time: hour, minute, second, hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosemTime {
    octet_string: [u8; 4],
}

impl CosemTime {
    pub const LENGTH: usize = 4;

    pub fn new(hour: u8, minute: u8, second: u8) -> DlmsResult<Self> {
        Self::new_with_hundredths(hour, minute, second, NOT_SPECIFIED)
    }

    /// Constructs a COSEM time; any field may be 0xff (not specified)
    pub fn new_with_hundredths(
        hour: u8,
        minute: u8,
        second: u8,
        hundredths: u8,
    ) -> DlmsResult<Self> {
        Self::verify(hour, "Hour", 23)?;
        Self::verify(minute, "Minute", 59)?;
        Self::verify(second, "Second", 59)?;
        Self::verify(hundredths, "Hundredths", 99)?;
        Ok(Self {
            octet_string: [hour, minute, second, hundredths],
        })
    }

    pub fn decode(bytes: &[u8]) -> DlmsResult<Self> {
        let octet_string: [u8; 4] = bytes.try_into().map_err(|_| {
            DlmsError::Format(format!(
                "Wrong time size. Expected {}, got {}",
                Self::LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { octet_string })
    }

    pub fn encode(&self) -> [u8; 4] {
        self.octet_string
    }

    pub fn hour(&self) -> Option<u8> {
        specified(self.octet_string[0])
    }

    pub fn minute(&self) -> Option<u8> {
        specified(self.octet_string[1])
    }

    pub fn second(&self) -> Option<u8> {
        specified(self.octet_string[2])
    }

    pub fn hundredths(&self) -> Option<u8> {
        specified(self.octet_string[3])
    }

    /// Wall-clock time; unspecified seconds and hundredths count as zero
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_milli_opt(
            self.hour()? as u32,
            self.minute()? as u32,
            self.second().unwrap_or(0) as u32,
            self.hundredths().unwrap_or(0) as u32 * 10,
        )
    }

    fn verify(value: u8, name: &str, upper_bound: u8) -> DlmsResult<()> {
        if value > upper_bound && value != NOT_SPECIFIED {
            Err(DlmsError::Format(format!(
                "{} is out of range [0, {}], got {}",
                name, upper_bound, value
            )))
        } else {
            Ok(())
        }
    }
}

impl From<NaiveTime> for CosemTime {
    fn from(time: NaiveTime) -> Self {
        let hundredths = (time.nanosecond() / 10_000_000).min(99) as u8;
        Self {
            octet_string: [
                time.hour() as u8,
                time.minute() as u8,
                time.second().min(59) as u8,
                hundredths,
            ],
        }
    }
}

impl fmt::Display for CosemTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [hour, minute, second, _] = self.octet_string;
        write!(f, "{:02}:{:02}:{:02}", hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosem_time_new() {
        let time = CosemTime::new(14, 30, 45).unwrap();
        assert_eq!(time.encode(), [14, 30, 45, 0xFF]);
        assert_eq!(time.hundredths(), None);
        assert_eq!(time.to_string(), "14:30:45");
    }

    #[test]
    fn test_cosem_time_invalid() {
        assert!(CosemTime::new(24, 0, 0).is_err());
        assert!(CosemTime::new(0, 60, 0).is_err());
        assert!(CosemTime::new(0, 0, 60).is_err());
        assert!(CosemTime::new(0xFF, 0xFF, 0xFF).is_ok());
    }

    #[test]
    fn test_cosem_time_decode_wrong_size() {
        assert!(CosemTime::decode(&[1, 2, 3]).is_err());
    }
}
