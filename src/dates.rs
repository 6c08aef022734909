//! Lenient date coercion for warehouse date-like fields.
//!
//! Release dates come at mixed precision (`1977`, `1977-05`, `1977-05-08`) and
//! chart weeks are sometimes exported as timestamps. Anything that doesn't
//! match a known shape coerces to `None` instead of failing the row.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

// Year-only or year-month precision: 1977, 1977-05
static PARTIAL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})(?:-(?P<month>\d{1,2}))?$").unwrap()
});

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a date-like cell. Partial precision resolves to the first day of the
/// period; time-of-day and UTC offsets are discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = PARTIAL_DATE_RE.captures(s) {
        let year: i32 = caps["year"].parse().ok()?;
        let month: u32 = match caps.name("month") {
            Some(m) => m.as_str().parse().ok()?,
            None => 1,
        };
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z"))
        .map(|dt| dt.date_naive())
        .ok()
}

/// Calendar quarter (1-4) of a date.
pub fn quarter(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}
