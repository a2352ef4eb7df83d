//! Time expression resolution and local display formatting
//!
//! History queries accept loose time expressions: `"now"`, ISO-like dates,
//! relative offsets such as `"35m"` or `"7d"`, and raw epoch milliseconds.
//! [`TimeResolver`] turns them into absolute UTC epoch milliseconds anchored
//! to an injectable [`Clock`].

use crate::error::{IoBrokerError, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const WEEK_MS: i64 = 7 * DAY_MS;

static RELATIVE_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([mhdw])$").expect("relative offset pattern is valid"));

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Display format for local timestamps (`16.08.2025, 10:00:00`)
const DISPLAY_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// The real system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A frozen clock, mostly for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Milliseconds per relative unit
pub(crate) fn unit_millis(unit: &str) -> Option<i64> {
    match unit {
        "m" => Some(MINUTE_MS),
        "h" => Some(HOUR_MS),
        "d" => Some(DAY_MS),
        "w" => Some(WEEK_MS),
        _ => None,
    }
}

/// Length of a `<n><unit>` duration such as `"30m"` in milliseconds
///
/// `None` when the expression has another shape or overflows.
pub(crate) fn relative_millis(expr: &str) -> Option<i64> {
    let captures = RELATIVE_OFFSET.captures(expr.trim())?;
    let amount: i64 = captures[1].parse().ok()?;
    amount.checked_mul(unit_millis(&captures[2])?)
}

/// Resolves time expressions into absolute epoch milliseconds
#[derive(Debug, Clone)]
pub struct TimeResolver {
    clock: Arc<dyn Clock>,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::system()
    }
}

impl TimeResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Resolver backed by the system clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Resolver frozen at `now_millis`
    pub fn fixed(now_millis: i64) -> Self {
        Self::new(Arc::new(FixedClock(now_millis)))
    }

    /// Current wall-clock time
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Resolve a time expression
    ///
    /// Rules are tried in order: `"now"`, absolute date/time (only when the
    /// expression contains `T` or `-`), `<n><unit>` relative offsets with
    /// `unit` in `m`, `h`, `d`, `w`, and finally a bare integer taken as epoch
    /// milliseconds.
    pub fn resolve(&self, expression: &str) -> Result<i64> {
        let expr = expression.trim();

        if expr.eq_ignore_ascii_case("now") {
            return Ok(self.now());
        }

        if expr.contains('T') || expr.contains('-') {
            if let Some(millis) = parse_absolute(expr) {
                return Ok(millis);
            }
        }

        if RELATIVE_OFFSET.is_match(expr) {
            return relative_millis(expr)
                .and_then(|offset| self.now().checked_sub(offset))
                .ok_or_else(|| IoBrokerError::invalid_time(expr));
        }

        expr.parse::<i64>()
            .map_err(|_| IoBrokerError::invalid_time(expr))
    }

    /// Resolve an optional expression, falling back to `default`
    pub fn resolve_or(&self, expression: Option<&str>, default: i64) -> Result<i64> {
        match expression {
            Some(expr) if !expr.trim().is_empty() => self.resolve(expr),
            _ => Ok(default),
        }
    }

    /// Identifier of the local timezone used for display
    ///
    /// Uses `TZ` when set, otherwise `UTC` or `UTC±HH:MM` from the local offset.
    pub fn timezone(&self) -> String {
        if let Ok(tz) = std::env::var("TZ") {
            let tz = tz.trim_start_matches(':').trim();
            if !tz.is_empty() {
                return tz.to_string();
            }
        }

        let offset = Local::now().offset().local_minus_utc();
        if offset == 0 {
            return "UTC".to_string();
        }
        let sign = if offset < 0 { '-' } else { '+' };
        let minutes = offset.abs() / 60;
        format!("UTC{sign}{:02}:{:02}", minutes / 60, minutes % 60)
    }

    /// Format an absolute timestamp as a local date-time string
    pub fn format_local(&self, millis: i64) -> String {
        format_local(millis)
    }
}

/// Format epoch milliseconds in the local timezone
pub fn format_local(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(datetime) => datetime.format(DISPLAY_FORMAT).to_string(),
        None => millis.to_string(),
    }
}

/// Parse an absolute date/time into epoch milliseconds
///
/// Timestamps with an offset are taken as is, naive date-times are local time,
/// and a bare date is UTC midnight.
fn parse_absolute(expr: &str) -> Option<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(expr) {
        return Some(datetime.timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(expr, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|datetime| datetime.timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(expr, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
