//! COSEM date type

use crate::error::{DlmsError, DlmsResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const NOT_SPECIFIED: u8 = 0xff;
const YEAR_NOT_SPECIFIED: u16 = 0xffff;
const LAST_DAY_OF_MONTH: u8 = 0xfe;
const SECOND_LAST_DAY_OF_MONTH: u8 = 0xfd;
const DAYLIGHT_SAVINGS_END: u8 = 0xfd;
const DAYLIGHT_SAVINGS_BEGIN: u8 = 0xfe;

/// COSEM date: year (2 bytes), month, day of month, day of week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosemDate {
    octet_string: [u8; 5],
}

impl CosemDate {
    pub const LENGTH: usize = 5;

    /// Constructs a COSEM date with an unspecified day of week
    ///
    /// # Arguments
    ///
    /// * `year` - The year, or 0xffff if not specified
    /// * `month` - 1 to 12, 0xfd/0xfe for DST end/begin, or 0xff
    /// * `day_of_month` - 1 to 31, 0xfe last day, 0xfd second last day, or 0xff
    pub fn new(year: u16, month: u8, day_of_month: u8) -> DlmsResult<Self> {
        Self::new_with_day_of_week(year, month, day_of_month, NOT_SPECIFIED)
    }

    /// Constructs a COSEM date with day of week (1 is Monday)
    pub fn new_with_day_of_week(
        year: u16,
        month: u8,
        day_of_month: u8,
        day_of_week: u8,
    ) -> DlmsResult<Self> {
        let month_ok = (1..=12).contains(&month)
            || matches!(month, DAYLIGHT_SAVINGS_END | DAYLIGHT_SAVINGS_BEGIN | NOT_SPECIFIED);
        if !month_ok {
            return Err(DlmsError::Format(format!("Month is out of range, got {}", month)));
        }
        let day_ok = (1..=31).contains(&day_of_month)
            || matches!(
                day_of_month,
                LAST_DAY_OF_MONTH | SECOND_LAST_DAY_OF_MONTH | NOT_SPECIFIED
            );
        if !day_ok {
            return Err(DlmsError::Format(format!(
                "Day of month is out of range, got {}",
                day_of_month
            )));
        }
        if !(1..=7).contains(&day_of_week) && day_of_week != NOT_SPECIFIED {
            return Err(DlmsError::Format(format!(
                "Day of week is out of range [1, 7], got {}",
                day_of_week
            )));
        }

        let [hi, lo] = year.to_be_bytes();
        Ok(Self {
            octet_string: [hi, lo, month, day_of_month, day_of_week],
        })
    }

    /// Decode from exactly five bytes; field values are taken as the meter sent them
    pub fn decode(bytes: &[u8]) -> DlmsResult<Self> {
        let octet_string: [u8; 5] = bytes.try_into().map_err(|_| {
            DlmsError::Format(format!(
                "Wrong date size. Expected {}, got {}",
                Self::LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { octet_string })
    }

    pub fn encode(&self) -> [u8; 5] {
        self.octet_string
    }

    pub fn year(&self) -> Option<u16> {
        let year = u16::from_be_bytes([self.octet_string[0], self.octet_string[1]]);
        (year != YEAR_NOT_SPECIFIED).then_some(year)
    }

    pub fn month(&self) -> Option<u8> {
        specified(self.octet_string[2])
    }

    pub fn day_of_month(&self) -> Option<u8> {
        specified(self.octet_string[3])
    }

    pub fn day_of_week(&self) -> Option<u8> {
        specified(self.octet_string[4])
    }

    /// Calendar date, if every field is specified and valid
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            self.year()? as i32,
            self.month()? as u32,
            self.day_of_month()? as u32,
        )
    }
}

impl From<NaiveDate> for CosemDate {
    fn from(date: NaiveDate) -> Self {
        let [hi, lo] = (date.year() as u16).to_be_bytes();
        Self {
            octet_string: [
                hi,
                lo,
                date.month() as u8,
                date.day() as u8,
                date.weekday().number_from_monday() as u8,
            ],
        }
    }
}

pub(crate) fn specified(value: u8) -> Option<u8> {
    (value != NOT_SPECIFIED).then_some(value)
}

impl fmt::Display for CosemDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [hi, lo, month, day, _] = self.octet_string;
        write!(f, "{:04}-{:02}-{:02}", u16::from_be_bytes([hi, lo]), month, day)
    }
}
