//! Reference code generation, validation and parsing.
//!
//! Format: `PREFIX [SEP] DATE [SEP] SEQUENCE`, e.g. `INV-20250101-0001`.
//!
//! The sequence restarts at 1 whenever the formatted date key changes. When
//! a sequence needs more digits than the configured width, the width grows
//! for the rest of the generator's lifetime; it never shrinks.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::clock::{
    Clock, SystemClock, format_instant, is_calendar_date, parse_time_zone, validate_pattern,
};
use crate::config::{CodeConfig, OverflowPolicy};
use crate::error::CodeError;
use crate::segments::{
    Segments, best_effort_date, compose, digit_count, is_sequence_segment, pad_sequence,
    parse_sequence, split_segments,
};

/// Parsed code components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCode {
    pub prefix: String,
    pub date: String,
    pub sequence: u64,
}

/// Snapshot of a generator's runtime state, for persisting between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratorState {
    pub last_date_key: Option<String>,
    pub current_sequence: u64,
    pub sequence_width: usize,
}

/// Reference code generator for one prefix/pattern/zone series.
///
/// `generate` mutates the per-instance sequence state and must be serialized
/// by the caller (see [`crate::SharedCodeGenerator`]). Every other operation
/// is stateless apart from the width ratchet, which is atomic.
#[derive(Debug)]
pub struct CodeGenerator {
    config: CodeConfig,
    tz: Tz,
    clock: Arc<dyn Clock>,
    sequence_width: AtomicUsize,
    last_date_key: Option<String>,
    current_sequence: u64,
}

impl CodeGenerator {
    /// Create a generator reading the wall clock.
    pub fn new(config: CodeConfig) -> Result<Self, CodeError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a generator reading the supplied clock.
    pub fn with_clock(config: CodeConfig, clock: Arc<dyn Clock>) -> Result<Self, CodeError> {
        if config.sequence_width == 0 {
            return Err(CodeError::ConfigurationError(
                "sequence width must be >= 1".to_string(),
            ));
        }
        let tz = parse_time_zone(&config.time_zone)?;
        validate_pattern(&config.date_format)?;
        if format_instant(clock.now(), tz, &config.date_format).is_empty() {
            return Err(CodeError::ConfigurationError(format!(
                "date format renders nothing: {}",
                config.date_format
            )));
        }

        Ok(Self {
            sequence_width: AtomicUsize::new(config.sequence_width),
            config,
            tz,
            clock,
            last_date_key: None,
            current_sequence: 0,
        })
    }

    /// Configuration as constructed; see [`Self::sequence_width`] for the live width.
    pub fn config(&self) -> &CodeConfig {
        &self.config
    }

    /// Current sequence width, including any growth.
    pub fn sequence_width(&self) -> usize {
        self.sequence_width.load(Ordering::Relaxed)
    }

    /// The current instant rendered in the configured zone and pattern.
    pub fn date_key(&self) -> String {
        format_instant(self.clock.now(), self.tz, &self.config.date_format)
    }

    /// Generate the next code from in-process state.
    pub fn generate(&mut self) -> String {
        let date_key = self.date_key();
        let sequence = match self.last_date_key.as_deref() {
            Some(last) if last == date_key => self.current_sequence.saturating_add(1),
            Some(last) => {
                debug!(previous = last, current = %date_key, "date key changed, sequence restarts");
                1
            }
            None => 1,
        };

        let (sequence, rendered) = self.render_sequence(sequence);
        let code = self.compose(&date_key, &rendered);
        self.last_date_key = Some(date_key);
        self.current_sequence = sequence;
        code
    }

    /// Generate n codes.
    pub fn next_n(&mut self, n: usize) -> Vec<String> {
        self.by_ref().take(n).collect()
    }

    /// Render a code for a caller-tracked sequence without touching in-process state.
    ///
    /// `date_key` defaults to [`Self::date_key`].
    pub fn generate_from_sequence(
        &self,
        sequence: u64,
        date_key: Option<&str>,
    ) -> Result<String, CodeError> {
        if sequence == 0 {
            return Err(CodeError::InvalidInput("sequence must be >= 1".to_string()));
        }
        let date_key = match date_key {
            Some("") => {
                return Err(CodeError::InvalidInput("date key must not be empty".to_string()));
            }
            Some(key) => key.to_string(),
            None => self.date_key(),
        };

        let (_, rendered) = self.render_sequence(sequence);
        Ok(self.compose(&date_key, &rendered))
    }

    /// Derive the code following `code`.
    ///
    /// Same date key: sequence + 1, keeping the embedded width if it is wider
    /// than the configured one. Different date key: sequence 1 under today's key.
    pub fn increment(&self, code: &str) -> Result<String, CodeError> {
        if code.is_empty() {
            return Err(CodeError::InvalidInput("code must not be empty".to_string()));
        }

        let today = self.date_key();
        let segments = self
            .recover(code, today.len())
            .ok_or_else(|| CodeError::InvalidFormat(code.to_string()))?;

        let next = if segments.date == today {
            let next = parse_sequence(segments.sequence)
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| CodeError::InvalidFormat(code.to_string()))?;
            self.grow_width(segments.sequence.len());
            next
        } else {
            1
        };

        self.generate_from_sequence(next, Some(&today))
    }

    /// Structural check: prefix, minimum length and an all-digit sequence segment.
    ///
    /// The date segment is not checked against the calendar; see
    /// [`Self::validate_strict`].
    pub fn validate(&self, code: &str) -> bool {
        self.recover(code, self.date_key().len()).is_some()
    }

    /// [`Self::validate`] plus a calendar check of the date segment.
    pub fn validate_strict(&self, code: &str) -> bool {
        self.recover(code, self.date_key().len())
            .is_some_and(|s| is_calendar_date(s.date, &self.config.date_format))
    }

    /// Split a valid code into its components.
    pub fn parse(&self, code: &str) -> Result<ParsedCode, CodeError> {
        if code.is_empty() {
            return Err(CodeError::InvalidInput("code must not be empty".to_string()));
        }
        let segments = self
            .recover(code, self.date_key().len())
            .ok_or_else(|| CodeError::InvalidFormat(code.to_string()))?;
        let sequence = parse_sequence(segments.sequence)
            .ok_or_else(|| CodeError::InvalidFormat(code.to_string()))?;

        Ok(ParsedCode {
            prefix: self.config.prefix.clone(),
            date: segments.date.to_string(),
            sequence,
        })
    }

    /// Date segment of `code`; a best-effort substring when the code is malformed.
    pub fn extract_date<'a>(&self, code: &'a str) -> &'a str {
        best_effort_date(
            code,
            &self.config.prefix,
            &self.config.separator,
            self.date_key().len(),
        )
    }

    /// Sequence value of `code`, or `None` if the segment is not numeric.
    pub fn extract_sequence(&self, code: &str) -> Option<u64> {
        split_segments(
            code,
            &self.config.prefix,
            &self.config.separator,
            self.date_key().len(),
        )
        .ok()
        .and_then(|s| parse_sequence(s.sequence))
    }

    /// Forget the last date key and sequence. Width growth is kept.
    pub fn reset(&mut self) {
        debug!(
            last_date_key = ?self.last_date_key,
            current_sequence = self.current_sequence,
            "generator state reset"
        );
        self.last_date_key = None;
        self.current_sequence = 0;
    }

    /// Get current state.
    pub fn state(&self) -> GeneratorState {
        GeneratorState {
            last_date_key: self.last_date_key.clone(),
            current_sequence: self.current_sequence,
            sequence_width: self.sequence_width(),
        }
    }

    /// Restore generator state. A narrower width than the current one is ignored.
    pub fn restore_state(&mut self, state: GeneratorState) {
        self.last_date_key = state.last_date_key;
        self.current_sequence = state.current_sequence;
        self.grow_width(state.sequence_width);
    }

    fn compose(&self, date_key: &str, rendered: &str) -> String {
        compose(
            &self.config.prefix,
            &self.config.separator,
            date_key,
            rendered,
        )
    }

    fn recover<'a>(&self, code: &'a str, date_len: usize) -> Option<Segments<'a>> {
        let prefix = &self.config.prefix;
        let separator = &self.config.separator;
        if !code.starts_with(prefix.as_str()) {
            return None;
        }
        if code.len() < prefix.len() + 2 * separator.len() + date_len + 1 {
            return None;
        }
        split_segments(code, prefix, separator, date_len)
            .ok()
            .filter(|s| is_sequence_segment(s.sequence))
    }

    /// Raise the width to at least `width`.
    fn grow_width(&self, width: usize) {
        let previous = self.sequence_width.fetch_max(width, Ordering::Relaxed);
        if width > previous {
            info!(previous, width, "sequence width adopted");
        }
    }

    /// One overflow event: widen by a single digit from `observed`.
    ///
    /// If another caller already widened past `observed`, their width stands.
    fn step_width(&self, observed: usize) -> usize {
        let widened = observed + 1;
        match self.sequence_width.compare_exchange(
            observed,
            widened,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                info!(previous = observed, width = widened, "sequence width grown");
                widened
            }
            Err(current) => current,
        }
    }

    /// Pad `sequence`, applying the overflow policy. Returns the value actually used.
    fn render_sequence(&self, sequence: u64) -> (u64, String) {
        let digits = digit_count(sequence);
        let width = self.sequence_width();
        if digits <= width {
            return (sequence, pad_sequence(sequence, width));
        }

        let width = self.step_width(width);
        match self.config.on_overflow {
            OverflowPolicy::Continue => (sequence, pad_sequence(sequence, width)),
            OverflowPolicy::Reset => {
                warn!(sequence, width, "sequence overflowed, restarting at 1");
                (1, pad_sequence(1, width))
            }
        }
    }
}

impl Iterator for CodeGenerator {
    type Item = String;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn generator_at(
        config: CodeConfig,
        instant: DateTime<Utc>,
    ) -> (CodeGenerator, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at(instant));
        let generator = CodeGenerator::with_clock(config, clock.clone()).unwrap();
        (generator, clock)
    }

    fn inv() -> CodeConfig {
        CodeConfig::new().prefix("INV").separator("-")
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(matches!(
            CodeGenerator::new(CodeConfig::new().sequence_width(0)),
            Err(CodeError::ConfigurationError(_))
        ));
        assert!(matches!(
            CodeGenerator::new(CodeConfig::new().time_zone("Nowhere/Special")),
            Err(CodeError::ConfigurationError(_))
        ));
        assert!(matches!(
            CodeGenerator::new(CodeConfig::new().date_format("%Y%")),
            Err(CodeError::ConfigurationError(_))
        ));
        assert!(CodeGenerator::new(CodeConfig::default()).is_ok());
    }

    #[test]
    fn test_generate_sequential() {
        let (mut g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(g.generate(), "INV-20230101-0001");
        assert_eq!(g.generate(), "INV-20230101-0002");
        assert_eq!(g.next_n(2), vec!["INV-20230101-0003", "INV-20230101-0004"]);
    }

    #[test]
    fn test_generate_restarts_on_new_date() {
        let (mut g, clock) = generator_at(inv(), utc(2023, 1, 1, 9));
        for _ in 0..5 {
            g.generate();
        }
        clock.set(utc(2023, 1, 2, 0));
        assert_eq!(g.generate(), "INV-20230102-0001");
    }

    #[test]
    fn test_generate_matches_generate_from_sequence() {
        let (mut g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        g.generate();
        let code = g.generate();
        let state = g.state();
        let replay = g
            .generate_from_sequence(state.current_sequence, state.last_date_key.as_deref())
            .unwrap();
        assert_eq!(code, replay);
    }

    #[test]
    fn test_overflow_grows_width_and_continues() {
        let (mut g, _) = generator_at(CodeConfig::new().sequence_width(1), utc(2023, 1, 1, 9));
        let codes = g.next_n(10);
        assert_eq!(codes[8], "202301019");
        assert_eq!(codes[9], "2023010110");
        assert_eq!(g.sequence_width(), 2);
        assert_eq!(g.generate(), "2023010111");
    }

    #[test]
    fn test_overflow_reset_policy() {
        let config = CodeConfig::new()
            .sequence_width(1)
            .on_overflow(OverflowPolicy::Reset);
        let (mut g, _) = generator_at(config, utc(2023, 1, 1, 9));
        let codes = g.next_n(10);
        assert_eq!(codes[9], "2023010101");
        assert_eq!(g.sequence_width(), 2);
        assert_eq!(g.generate(), "2023010102");
    }

    #[test]
    fn test_generate_from_sequence_is_stateless() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(
            g.generate_from_sequence(42, None).unwrap(),
            "INV-20230101-0042"
        );
        assert_eq!(
            g.generate_from_sequence(7, Some("20221231")).unwrap(),
            "INV-20221231-0007"
        );
        assert_eq!(g.state().last_date_key, None);
        assert_eq!(g.state().current_sequence, 0);
    }

    #[test]
    fn test_generate_from_sequence_rejects_bad_input() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert!(matches!(
            g.generate_from_sequence(0, None),
            Err(CodeError::InvalidInput(_))
        ));
        assert!(matches!(
            g.generate_from_sequence(1, Some("")),
            Err(CodeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_generate_from_sequence_grows_width() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(
            g.generate_from_sequence(123_456, None).unwrap(),
            "INV-20230101-123456"
        );
        assert_eq!(g.sequence_width(), 5);
        assert_eq!(g.generate_from_sequence(1, None).unwrap(), "INV-20230101-00001");

        // each further overflow widens by one more digit
        assert_eq!(
            g.generate_from_sequence(1_234_567, None).unwrap(),
            "INV-20230101-1234567"
        );
        assert_eq!(g.sequence_width(), 6);
        assert_eq!(g.generate_from_sequence(2, None).unwrap(), "INV-20230101-000002");
    }

    #[test]
    fn test_increment_same_day() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(g.increment("INV-20230101-0041").unwrap(), "INV-20230101-0042");
        assert_eq!(g.increment("INV-20230101-9999").unwrap(), "INV-20230101-10000");
        assert_eq!(g.sequence_width(), 5);
    }

    #[test]
    fn test_increment_preserves_wider_width() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(g.increment("INV-20230101-00001").unwrap(), "INV-20230101-00002");
        assert!(g.sequence_width() >= 5);
        assert_eq!(g.generate_from_sequence(3, None).unwrap(), "INV-20230101-00003");
    }

    #[test]
    fn test_increment_rolls_over_to_today() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 2, 9));
        assert_eq!(g.increment("INV-20230101-0042").unwrap(), "INV-20230102-0001");
        assert_eq!(g.increment("INV-20230101-00042").unwrap(), "INV-20230102-0001");
        assert_eq!(g.sequence_width(), 4);
    }

    #[test]
    fn test_increment_rejects_invalid_code() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert!(matches!(
            g.increment("INVALID"),
            Err(CodeError::InvalidFormat(_))
        ));
        assert!(matches!(g.increment(""), Err(CodeError::InvalidInput(_))));
        assert!(matches!(
            g.increment("INV-20230101-00x01"),
            Err(CodeError::InvalidFormat(_))
        ));
        assert_eq!(g.sequence_width(), 4);
    }

    #[test]
    fn test_validate() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert!(g.validate("INV-20230101-0001"));
        assert!(g.validate("INV-20230101-123456"));
        assert!(!g.validate("ORD-20230101-0001"));
        assert!(!g.validate("INV-20230101-"));
        assert!(!g.validate("INV-20230101-00a1"));
        assert!(!g.validate("INV-2023"));
        assert!(!g.validate(""));
    }

    #[test]
    fn test_validate_strict_checks_calendar() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert!(g.validate("INV-20231301-0001"));
        assert!(!g.validate_strict("INV-20231301-0001"));
        assert!(g.validate_strict("INV-20240229-0001"));
    }

    #[test]
    fn test_parse_and_extract() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        let p = g.parse("INV-20230101-0001").unwrap();
        assert_eq!(
            p,
            ParsedCode {
                prefix: "INV".to_string(),
                date: "20230101".to_string(),
                sequence: 1,
            }
        );
        assert_eq!(g.extract_date("INV-20230101-0001"), "20230101");
        assert_eq!(g.extract_sequence("INV-20230101-0001"), Some(1));
        assert!(matches!(g.parse("INVALID"), Err(CodeError::InvalidFormat(_))));
        assert!(matches!(g.parse(""), Err(CodeError::InvalidInput(_))));
    }

    #[test]
    fn test_extract_from_malformed_codes() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        assert_eq!(g.extract_date("INV-2023"), "2023");
        assert_eq!(g.extract_date("X"), "");
        assert_eq!(g.extract_sequence("INV-20230101-abc"), None);
        assert_eq!(g.extract_sequence("INVALID"), None);
    }

    #[test]
    fn test_no_separator_uses_pattern_length() {
        let (mut g, _) = generator_at(CodeConfig::new().prefix("PO"), utc(2023, 1, 1, 9));
        let code = g.generate();
        assert_eq!(code, "PO202301010001");
        assert!(g.validate(&code));
        assert_eq!(g.extract_date(&code), "20230101");
        assert_eq!(g.increment(&code).unwrap(), "PO202301010002");
    }

    #[test]
    fn test_prefix_containing_separator() {
        let config = CodeConfig::new().prefix("AB-C").separator("-");
        let (mut g, _) = generator_at(config, utc(2023, 1, 1, 9));
        let code = g.generate();
        assert_eq!(code, "AB-C-20230101-0001");
        assert_eq!(g.parse(&code).unwrap().date, "20230101");
    }

    #[test]
    fn test_reset_keeps_width() {
        let (mut g, _) = generator_at(inv().sequence_width(1), utc(2023, 1, 1, 9));
        g.next_n(10);
        g.reset();
        assert_eq!(g.state().last_date_key, None);
        assert_eq!(g.state().current_sequence, 0);
        assert_eq!(g.generate(), "INV-20230101-01");
    }

    #[test]
    fn test_state_restore() {
        let (mut g1, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        g1.next_n(3);
        let state = g1.state();

        let (mut g2, _) = generator_at(inv(), utc(2023, 1, 1, 10));
        g2.restore_state(state);
        assert_eq!(g2.generate(), "INV-20230101-0004");

        g2.restore_state(GeneratorState {
            sequence_width: 2,
            ..GeneratorState::default()
        });
        assert_eq!(g2.sequence_width(), 4);
    }

    #[test]
    fn test_iterator_take() {
        let (g, _) = generator_at(inv(), utc(2023, 1, 1, 9));
        let v: Vec<String> = g.take(3).collect();
        assert_eq!(v.last().map(String::as_str), Some("INV-20230101-0003"));
    }
}
