//! Time and time-of-day helpers.
//!
//! Evaluation only ever looks at the hour and minute of the wall clock.
//! [`TimeOfDay`] captures exactly that, and [`TimeWindow`] implements the
//! activation-window rules shared by automations and time conditions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// UTC timestamp used for persisted reading times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A minute of the day, written `HH:MM` in 24-hour format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Midnight, `00:00`.
    pub const MIDNIGHT: Self = Self(0);

    /// Build from an hour (`0..24`) and a minute (`0..60`).
    #[must_use]
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    /// Truncate any clock-like value to its hour and minute. Seconds and the
    /// calendar date are ignored.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn of<T: Timelike>(time: &T) -> Self {
        // hour < 24 and minute < 60, the product always fits
        Self((time.hour() * 60 + time.minute()) as u16 % MINUTES_PER_DAY)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    /// Accepts exactly `^([01][0-9]|2[0-3]):([0-5][0-9])$`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digit = |b: u8| b.is_ascii_digit().then(|| b - b'0');
        let (Some(h1), Some(h2), Some(m1), Some(m2)) =
            (digit(bytes[0]), digit(bytes[1]), digit(bytes[3]), digit(bytes[4]))
        else {
            return Err(invalid());
        };
        Self::new(h1 * 10 + h2, m1 * 10 + m2).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// An optional time-of-day range.
///
/// - Both bounds absent: always active.
/// - Only `start_time`: active during that single minute (a one-shot trigger).
/// - Only `end_time`: active from midnight until `end_time` (exclusive).
/// - `end_time < start_time`: the window crosses midnight.
/// - Otherwise: `start_time` inclusive, `end_time` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeOfDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeOfDay>,
}

impl TimeWindow {
    /// A window with no bounds, active at every minute.
    pub const ALWAYS: Self = Self {
        start_time: None,
        end_time: None,
    };

    #[must_use]
    pub fn new(start_time: Option<TimeOfDay>, end_time: Option<TimeOfDay>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// Parse both bounds from optional `HH:MM` strings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimeOfDay`] if a present bound is malformed.
    pub fn parse(start_time: Option<&str>, end_time: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            start_time: start_time.map(str::parse).transpose()?,
            end_time: end_time.map(str::parse).transpose()?,
        })
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    #[must_use]
    pub fn contains(&self, now: TimeOfDay) -> bool {
        is_between(self.start_time, self.end_time, now)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start_time, self.end_time) {
            (None, None) => f.write_str("always"),
            (Some(start), None) => write!(f, "at {start}"),
            (None, Some(end)) => write!(f, "..{end}"),
            (Some(start), Some(end)) => write!(f, "{start}..{end}"),
        }
    }
}

/// Whether `now` falls inside the window described by `start` and `end`.
/// See [`TimeWindow`] for the rules.
#[must_use]
pub fn is_between(start: Option<TimeOfDay>, end: Option<TimeOfDay>, now: TimeOfDay) -> bool {
    match (start, end) {
        (None, None) => true,
        (Some(start), None) => now == start,
        (None, Some(end)) => now < end,
        (Some(start), Some(end)) if end < start => now >= start || now < end,
        (Some(start), Some(end)) => now >= start && now < end,
    }
}
