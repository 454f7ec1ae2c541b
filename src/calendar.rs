use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::ForecastError;

pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_WEEK: u32 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Calendar-derived scalars for one (date, hour) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub day: u32,
    pub month: u32,
    pub hour: u32,
    /// Monday = 0 ... Sunday = 6
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl CalendarFields {
    /// Same date, different hour. Everything but `hour` is date-derived and
    /// stays fixed.
    pub fn at_hour(self, hour: u32) -> Self {
        debug_assert!(hour < HOURS_PER_DAY, "hour {hour} out of range");
        Self { hour, ..self }
    }
}

/// Encodes `date` at an explicit `hour` (0..=23). The hour is supplied on its
/// own; the date carries no clock fields.
pub fn encode(date: NaiveDate, hour: u32) -> CalendarFields {
    debug_assert!(hour < HOURS_PER_DAY, "hour {hour} out of range");
    let day_of_week = date.weekday().num_days_from_monday();
    CalendarFields {
        day: date.day(),
        month: date.month(),
        hour,
        day_of_week,
        is_weekend: day_of_week == 5 || day_of_week == 6,
    }
}

/// Drops the time of day, so 2024-08-15T17:30 encodes like 2024-08-15T00:00.
pub fn normalize(datetime: NaiveDateTime) -> NaiveDate {
    datetime.date()
}

/// Parses a `YYYY-MM-DD` request date. A full timestamp is also accepted and
/// its time of day dropped.
pub fn parse_date(input: &str) -> Result<NaiveDate, ForecastError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).or_else(|e| {
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(normalize)
            .ok_or_else(|| ForecastError::InvalidDate {
                input: input.to_string(),
                reason: e.to_string(),
            })
    })
}
