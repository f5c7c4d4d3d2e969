//! Time source and day-granularity dates
//!
//! Recommendations carry a creation *day* rather than an instant, rendered as
//! `YYYY/MM/DD`. The format sorts lexicographically, so day strings can be
//! range-filtered directly in the document store.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::sync::RwLock;

use crate::types::HealthError;

/// Day format shared by the writers and the freshness check
pub const DAY_FORMAT: &str = "%Y/%m/%d";

/// Format an instant as a day string (UTC)
pub fn format_day(instant: DateTime<Utc>) -> String {
    instant.format(DAY_FORMAT).to_string()
}

/// Years whose day strings have four digits and keep lexicographic order
const DAY_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parse a `YYYY/MM/DD` day string
pub fn parse_day(day: &str) -> Result<NaiveDate, HealthError> {
    let date = NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map_err(|e| HealthError::BadRequest(format!("invalid date '{}': {}", day, e)))?;

    if !DAY_YEARS.contains(&date.year()) {
        return Err(HealthError::BadRequest(format!(
            "invalid date '{}': year must be between 0001 and 9999",
            day
        )));
    }

    Ok(date)
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's day string
    fn today(&self) -> String {
        format_day(self.now())
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: i64) {
        if let Ok(mut guard) = self.now.write() {
            *guard += Duration::days(days);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|guard| *guard).unwrap_or_else(|p| *p.into_inner())
    }
}
