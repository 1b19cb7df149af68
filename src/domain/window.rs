use crate::domain::TimeWindow;
use thiserror::Error;
use time::error::ComponentRange;
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

pub const MAX_RANGE_HOURS: u32 = 72;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("invalid hour format: {0}, it should be like 12PM or 3AM")]
    InvalidHour(String),

    #[error("invalid date: {0}")]
    InvalidDate(#[source] ComponentRange),

    #[error("range must be between 1 and {MAX_RANGE_HOURS} hours, got {0}")]
    RangeOutOfBounds(u32),

    #[error("time window ends past the supported calendar")]
    EndOutOfRange,

    #[error("date should be formatted as MMDDYYYY (like 05152025), got: {0}")]
    InvalidBasicDate(String),
}

/// Converts a 12-hour clock string (`12AM`, `3pm`, ` 11PM `) into a 24-hour value.
pub fn parse_hour(value: &str) -> Result<u8, WindowError> {
    let normalized = value.trim().to_ascii_uppercase();
    let invalid = || WindowError::InvalidHour(value.to_string());

    let (digits, is_pm) = if let Some(digits) = normalized.strip_suffix("AM") {
        (digits, false)
    } else if let Some(digits) = normalized.strip_suffix("PM") {
        (digits, true)
    } else {
        return Err(invalid());
    };

    if digits.is_empty()
        || digits.len() > 2
        || digits.starts_with('0')
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let hour: u8 = digits.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) {
        return Err(invalid());
    }

    Ok(match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (hour, false) => hour,
        (hour, true) => hour + 12,
    })
}

pub fn build_time_window(
    year: i32,
    month: u8,
    day: u8,
    hour: &str,
    range_hours: u32,
) -> Result<TimeWindow, WindowError> {
    let hour = parse_hour(hour)?;
    if range_hours == 0 || range_hours > MAX_RANGE_HOURS {
        return Err(WindowError::RangeOutOfBounds(range_hours));
    }

    let month = Month::try_from(month).map_err(WindowError::InvalidDate)?;
    let date = Date::from_calendar_date(year, month, day).map_err(WindowError::InvalidDate)?;
    let time = Time::from_hms(hour, 0, 0).map_err(WindowError::InvalidDate)?;
    let start = PrimitiveDateTime::new(date, time);
    let end = start
        .checked_add(Duration::hours(i64::from(range_hours)))
        .ok_or(WindowError::EndOutOfRange)?;

    Ok(TimeWindow { start, end })
}

/// Parses the compact `MMDDYYYY` form used by date-range filters.
pub fn parse_basic_date(value: &str) -> Result<Date, WindowError> {
    let trimmed = value.trim();
    let invalid = || WindowError::InvalidBasicDate(value.to_string());
    if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let month: u8 = trimmed[0..2].parse().map_err(|_| invalid())?;
    let day: u8 = trimmed[2..4].parse().map_err(|_| invalid())?;
    let year: i32 = trimmed[4..8].parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}
