//! Epoch / calendar conversions used by the frame builders and log records.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// Calendar date-time split used by log headers, AOP bulletins and the
/// prepass search window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
}

impl CalendarTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, min: u8, sec: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            min,
            sec,
        }
    }

    /// Convert to epoch seconds; invalid calendar fields yield `None`.
    pub fn to_epoch(self) -> Option<i64> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        let dt = date.and_hms_opt(u32::from(self.hour), u32::from(self.min), u32::from(self.sec))?;
        Some(dt.and_utc().timestamp())
    }

    /// Split epoch seconds into calendar fields (UTC).
    pub fn from_epoch(epoch: i64) -> Self {
        let dt: DateTime<Utc> = Utc.timestamp_opt(epoch, 0).single().unwrap_or_default();
        Self {
            year: dt.year() as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            min: dt.minute() as u8,
            sec: dt.second() as u8,
        }
    }
}
