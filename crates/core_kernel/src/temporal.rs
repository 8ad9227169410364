//! Billing calendar helpers
//!
//! This module provides the calendar primitives the billing engine needs:
//! - The billing timezone used to decide what "today" is
//! - Inclusive calendar date ranges that can be walked day by day
//! - Ordinal date formatting for invoice line descriptions

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Timezone wrapper for the billing calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name such as `Asia/Dhaka`
    pub fn parse(name: &str) -> Result<Self, TemporalError> {
        Tz::from_str(name)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(name.to_string()))
    }

    /// Returns the calendar date of `instant` in this timezone
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Returns today's calendar date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Dhaka)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid date range: start {start} must not be after end {end}")]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Date out of range")]
    OutOfRange,
}

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new range, rejecting an end before the start
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates the range from `start` to the last day of its month
    pub fn rest_of_month(start: NaiveDate) -> Result<Self, TemporalError> {
        Self::new(start, last_day_of_month(start)?)
    }

    /// Number of days covered, counting both ends
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Returns true if the date lies within the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterates every date in the range in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Returns the last calendar day of the month containing `date`
pub fn last_day_of_month(date: NaiveDate) -> Result<NaiveDate, TemporalError> {
    let first = date.with_day(1).ok_or(TemporalError::OutOfRange)?;
    let next_month = first
        .checked_add_months(Months::new(1))
        .ok_or(TemporalError::OutOfRange)?;
    next_month.pred_opt().ok_or(TemporalError::OutOfRange)
}

/// English ordinal suffix for a day of month ("1st", "22nd", "13th")
pub fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}

/// Formats a date as "1st June"
pub fn format_ordinal_day_month(date: NaiveDate) -> String {
    format!("{} {}", ordinal(date.day()), date.format("%B"))
}

/// Formats an inclusive period for invoice descriptions
///
/// Within one year the year is printed once at the end
/// ("1st June to 30th June-2025"); across years each side carries its own
/// ("1st December-2024 to 31st January-2025").
pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() == end.year() {
        format!(
            "{} to {}-{}",
            format_ordinal_day_month(start),
            format_ordinal_day_month(end),
            end.year()
        )
    } else {
        format!(
            "{}-{} to {}-{}",
            format_ordinal_day_month(start),
            start.year(),
            format_ordinal_day_month(end),
            end.year()
        )
    }
}
