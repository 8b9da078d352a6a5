//! Calendar utilities
//!
//! Daily quotas reset on the UTC calendar date of the running process.
//! The [`Clock`] trait lets the ledgers ask "what day is it" without
//! reaching for a global, so tests can move the date forward.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

/// Storage format for `last_request_date` (ISO 8601 calendar date)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of "today" for quota accounting
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current calendar date (day granularity)
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC date
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        now().date_naive()
    }
}

/// Clock pinned to a date that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    date: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    /// Jump to an arbitrary date
    pub fn set(&self, date: NaiveDate) {
        *self.lock() = date;
    }

    /// Move forward by `days` calendar days
    pub fn advance_days(&self, days: u64) {
        let mut date = self.lock();
        *date = *date + chrono::Days::new(days);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDate> {
        // A poisoned lock still holds a valid date.
        self.date.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.lock()
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a date the way it is stored in the users table
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored date; `None` for empty or malformed values
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}
