//! Date/time backend: the current instant, IANA zones and strftime patterns.

use chrono::format::{Item, ParseErrorKind, Parsed, StrftimeItems};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::CodeError;

/// Source of the current instant.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with millisecond resolution.
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(instant.timestamp_millis()),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis.store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

/// Resolve an IANA zone name such as `Asia/Bangkok`.
pub fn parse_time_zone(name: &str) -> Result<Tz, CodeError> {
    name.parse::<Tz>()
        .map_err(|_| CodeError::ConfigurationError(format!("unknown time zone: {name}")))
}

/// Reject patterns chrono cannot render.
pub fn validate_pattern(pattern: &str) -> Result<(), CodeError> {
    if pattern.is_empty() {
        return Err(CodeError::ConfigurationError(
            "date format must not be empty".to_string(),
        ));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(CodeError::ConfigurationError(format!(
            "invalid date format: {pattern}"
        )));
    }
    Ok(())
}

/// Render `instant` in `tz` with a pattern already accepted by [`validate_pattern`].
pub fn format_instant(instant: DateTime<Utc>, tz: Tz, pattern: &str) -> String {
    instant.with_timezone(&tz).format(pattern).to_string()
}

/// True if `s` parses under `pattern` and names an existing calendar date.
///
/// Patterns too coarse to form a date (e.g. `%Y%m`) only need their fields
/// to parse in range.
pub fn is_calendar_date(s: &str, pattern: &str) -> bool {
    let mut parsed = Parsed::new();
    if chrono::format::parse(&mut parsed, s, StrftimeItems::new(pattern)).is_err() {
        return false;
    }
    match parsed.to_naive_date() {
        Ok(_) => true,
        Err(e) => e.kind() == ParseErrorKind::NotEnough,
    }
}
