//! Calendar-day normalization.
//!
//! Completions are tracked at calendar-day granularity under one fixed
//! convention: UTC-midnight truncation. Two timestamps share a day key
//! iff they fall on the same UTC calendar day.

use chrono::{DateTime, NaiveDate, Utc};

/// Canonical calendar-day key for a timestamp.
pub fn day_key(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Today's calendar-day key.
pub fn today() -> NaiveDate {
    day_key(Utc::now())
}
