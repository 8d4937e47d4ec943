//! COSEM date-time type

use crate::datatypes::cosem_date::CosemDate;
use crate::datatypes::cosem_time::CosemTime;
use crate::error::{DlmsError, DlmsResult};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deviation value meaning "not specified"
pub const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

/// Clock status flags for COSEM date-time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    InvalidValue = 0x01,
    DoubtfulValue = 0x02,
    DifferentClockBase = 0x04,
    InvalidClockStatus = 0x08,
    DaylightSavingActive = 0x80,
}

impl ClockStatus {
    const ALL: [ClockStatus; 5] = [
        ClockStatus::InvalidValue,
        ClockStatus::DoubtfulValue,
        ClockStatus::DifferentClockBase,
        ClockStatus::InvalidClockStatus,
        ClockStatus::DaylightSavingActive,
    ];

    pub fn to_byte(statuses: &[ClockStatus]) -> u8 {
        statuses.iter().fold(0u8, |byte, status| byte | *status as u8)
    }

    pub fn from_byte(byte: u8) -> Vec<ClockStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| byte & *status as u8 != 0)
            .collect()
    }
}

/// COSEM date-time: date (5), time (4), deviation (2, signed), clock status (1)
///
/// The deviation is the local time offset from UTC in minutes, positive east
/// of Greenwich (UTC+08:00 is `480`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosemDateTime {
    date: CosemDate,
    time: CosemTime,
    deviation: i16,
    clock_status: u8,
}

impl CosemDateTime {
    pub const LENGTH: usize = 12;

    /// Constructs a COSEM date-time
    ///
    /// # Arguments
    ///
    /// * `deviation` - Minutes from UTC in [-720, 720], or [`DEVIATION_NOT_SPECIFIED`]
    /// * `clock_status` - Clock status flags
    pub fn new(
        date: CosemDate,
        time: CosemTime,
        deviation: i16,
        clock_status: &[ClockStatus],
    ) -> DlmsResult<Self> {
        if !(-720..=720).contains(&deviation) && deviation != DEVIATION_NOT_SPECIFIED {
            return Err(DlmsError::Format(format!(
                "Deviation is out of range [-720, 720], got {}",
                deviation
            )));
        }
        Ok(Self {
            date,
            time,
            deviation,
            clock_status: ClockStatus::to_byte(clock_status),
        })
    }

    /// Local wall-clock time with deviation left unspecified
    pub fn from_naive(naive: NaiveDateTime) -> Self {
        Self {
            date: CosemDate::from(naive.date()),
            time: CosemTime::from(naive.time()),
            deviation: DEVIATION_NOT_SPECIFIED,
            clock_status: 0,
        }
    }

    /// Wall-clock time of `date_time` with its offset as deviation
    pub fn from_chrono<Tz: TimeZone>(date_time: &DateTime<Tz>) -> Self {
        let offset_minutes = date_time.fixed_offset().offset().local_minus_utc() / 60;
        Self {
            deviation: offset_minutes as i16,
            ..Self::from_naive(date_time.naive_local())
        }
    }

    /// Decode from exactly twelve bytes
    pub fn decode(bytes: &[u8]) -> DlmsResult<Self> {
        if bytes.len() != Self::LENGTH {
            return Err(DlmsError::Format(format!(
                "Wrong date-time size. Expected {}, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }
        Ok(Self {
            date: CosemDate::decode(&bytes[0..5])?,
            time: CosemTime::decode(&bytes[5..9])?,
            deviation: i16::from_be_bytes([bytes[9], bytes[10]]),
            clock_status: bytes[11],
        })
    }

    pub fn encode(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..5].copy_from_slice(&self.date.encode());
        out[5..9].copy_from_slice(&self.time.encode());
        out[9..11].copy_from_slice(&self.deviation.to_be_bytes());
        out[11] = self.clock_status;
        out
    }

    pub fn date(&self) -> &CosemDate {
        &self.date
    }

    pub fn time(&self) -> &CosemTime {
        &self.time
    }

    /// Deviation in minutes, `None` when not specified
    pub fn deviation(&self) -> Option<i16> {
        (self.deviation != DEVIATION_NOT_SPECIFIED).then_some(self.deviation)
    }

    pub fn clock_status(&self) -> Vec<ClockStatus> {
        ClockStatus::from_byte(self.clock_status)
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        Some(self.date.to_naive_date()?.and_time(self.time.to_naive_time()?))
    }

    /// Absolute instant, available when the deviation is specified
    pub fn to_fixed_offset(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.deviation()? as i32 * 60)?;
        offset.from_local_datetime(&self.to_naive()?).single()
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)?;
        if let Some(deviation) = self.deviation() {
            let sign = if deviation < 0 { '-' } else { '+' };
            let minutes = deviation.unsigned_abs();
            write!(f, " {}{:02}:{:02}", sign, minutes / 60, minutes % 60)?;
        }
        Ok(())
    }
}
