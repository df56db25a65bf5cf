//! Time-of-day and weekday primitives.
//!
//! Source schedule data arrives with inconsistent time formats (24-hour with
//! optional seconds, or 12-hour with AM/PM) and abbreviated weekday keys in
//! mixed casing. Both are normalized here, at the edge; the core only ever
//! sees the parsed forms.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("empty time string")]
    Empty,
    #[error("unrecognized time format: {0}")]
    Unrecognized(String),
    #[error("time out of range: {0}")]
    OutOfRange(String),
}

/// A wall-clock time within a day, stored as minutes since midnight.
///
/// Comparisons between slots and the current clock all happen in
/// minutes-of-day space, which is how the source gates same-day slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

    pub fn from_hm(hour: u8, minute: u8) -> Result<Self, TimeParseError> {
        if hour > 23 || minute > 59 {
            return Err(TimeParseError::OutOfRange(format!("{hour:02}:{minute:02}")));
        }
        Ok(TimeOfDay(u16::from(hour) * 60 + u16::from(minute)))
    }

    pub fn from_minutes(minutes: u16) -> Result<Self, TimeParseError> {
        if minutes >= 24 * 60 {
            return Err(TimeParseError::OutOfRange(format!("{minutes} minutes")));
        }
        Ok(TimeOfDay(minutes))
    }

    pub fn minutes_of_day(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    /// 12-hour display form, e.g. `9:30 AM`, `12:05 PM`.
    pub fn format_12h(self) -> String {
        let hour = self.hour();
        let ampm = if hour >= 12 { "PM" } else { "AM" };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour12, self.minute(), ampm)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    /// Accepts `HH:MM`, `HH:MM:SS`, `H:MM AM/PM`, and `HAM`/`H PM` variants,
    /// in any casing. Seconds are discarded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(TimeParseError::Empty);
        }

        let upper = raw.to_ascii_uppercase();
        let has_pm = upper.contains("PM");
        let has_am = upper.contains("AM");

        let cleaned: String = upper
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ':')
            .collect();
        if cleaned.is_empty() {
            return Err(TimeParseError::Unrecognized(s.to_string()));
        }

        let mut parts = cleaned.split(':');
        let hour_part = parts.next().unwrap_or_default();
        let minute_part = parts.next().unwrap_or("0");
        // Anything past minutes (seconds) is ignored.

        let mut hour: u16 = hour_part
            .parse()
            .map_err(|_| TimeParseError::Unrecognized(s.to_string()))?;
        let minute: u16 = if minute_part.is_empty() {
            0
        } else {
            minute_part
                .parse()
                .map_err(|_| TimeParseError::Unrecognized(s.to_string()))?
        };

        if has_pm && hour < 12 {
            hour += 12;
        }
        if has_am && hour == 12 {
            hour = 0;
        }

        if hour > 23 || minute > 59 {
            return Err(TimeParseError::OutOfRange(s.to_string()));
        }
        Ok(TimeOfDay(hour * 60 + minute))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Closed weekday enumeration.
///
/// The source keyed weekly schedules by abbreviated strings with inconsistent
/// casing; parsing is lenient here so the rest of the crate never handles raw
/// strings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
pub enum Weekday {
    #[serde(alias = "Sun", alias = "sun", alias = "sunday", alias = "SUNDAY")]
    Sunday,
    #[serde(alias = "Mon", alias = "mon", alias = "monday", alias = "MONDAY")]
    Monday,
    #[serde(alias = "Tue", alias = "tue", alias = "tuesday", alias = "TUESDAY")]
    Tuesday,
    #[serde(alias = "Wed", alias = "wed", alias = "wednesday", alias = "WEDNESDAY")]
    Wednesday,
    #[serde(alias = "Thu", alias = "thu", alias = "thursday", alias = "THURSDAY")]
    Thursday,
    #[serde(alias = "Fri", alias = "fri", alias = "friday", alias = "FRIDAY")]
    Friday,
    #[serde(alias = "Sat", alias = "sat", alias = "saturday", alias = "SATURDAY")]
    Saturday,
}

impl Weekday {
    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sun",
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
        }
    }

    /// Lenient parse: matches short or full names in any casing.
    pub fn parse_lenient(s: &str) -> Option<Weekday> {
        let lower = s.trim().to_ascii_lowercase();
        let day = match lower.as_str() {
            "sun" | "sunday" => Weekday::Sunday,
            "mon" | "monday" => Weekday::Monday,
            "tue" | "tues" | "tuesday" => Weekday::Tuesday,
            "wed" | "wednesday" => Weekday::Wednesday,
            "thu" | "thur" | "thurs" | "thursday" => Weekday::Thursday,
            "fri" | "friday" => Weekday::Friday,
            "sat" | "saturday" => Weekday::Saturday,
            _ => return None,
        };
        Some(day)
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(wd: chrono::Weekday) -> Self {
        match wd {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }
}
