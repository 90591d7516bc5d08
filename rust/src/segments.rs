//! Code composition and segment recovery.
//!
//! Format: `PREFIX [SEP] DATE [SEP] SEQUENCE`
//!
//! Everything here is a pure function of its arguments; the stateful
//! generator builds on top of it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CodeError;

static SEQUENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Date and sequence segments recovered from a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments<'a> {
    pub date: &'a str,
    pub sequence: &'a str,
}

/// Decimal `n` left-padded with zeros to `width`. Never truncates.
pub fn pad_sequence(n: u64, width: usize) -> String {
    format!("{:0width$}", n, width = width)
}

/// Number of decimal digits in `n`.
pub fn digit_count(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |log| log as usize + 1)
}

/// Join the three segments into a code.
pub fn compose(prefix: &str, separator: &str, date_key: &str, sequence: &str) -> String {
    let mut code =
        String::with_capacity(prefix.len() + date_key.len() + sequence.len() + 2 * separator.len());
    code.push_str(prefix);
    code.push_str(separator);
    code.push_str(date_key);
    code.push_str(separator);
    code.push_str(sequence);
    code
}

/// True if `s` is a non-empty run of ASCII digits.
pub fn is_sequence_segment(s: &str) -> bool {
    SEQUENCE_PATTERN.is_match(s)
}

/// Parse a sequence segment. `None` for non-digit content or values beyond `u64`.
pub fn parse_sequence(s: &str) -> Option<u64> {
    if !is_sequence_segment(s) {
        return None;
    }
    s.parse().ok()
}

/// Recover the date and sequence segments of `code`.
///
/// With a separator, the sequence follows the last separator occurrence,
/// provided that occurrence lies past the `prefix + separator` region;
/// otherwise (and always without a separator) the date segment is taken to
/// be exactly `date_len` bytes long.
pub fn split_segments<'a>(
    code: &'a str,
    prefix: &str,
    separator: &str,
    date_len: usize,
) -> Result<Segments<'a>, CodeError> {
    if !code.starts_with(prefix) {
        return Err(CodeError::InvalidFormat(code.to_string()));
    }

    let date_start = prefix.len() + separator.len();

    if !separator.is_empty() {
        if let Some(last) = code.rfind(separator).filter(|&pos| pos > date_start) {
            let date = code.get(date_start..last);
            let sequence = code.get(last + separator.len()..);
            if let (Some(date), Some(sequence)) = (date, sequence) {
                return Ok(Segments { date, sequence });
            }
            return Err(CodeError::InvalidFormat(code.to_string()));
        }
    }

    let date_end = date_start + date_len;
    let sequence_start = date_end + separator.len();
    match (code.get(date_start..date_end), code.get(sequence_start..)) {
        (Some(date), Some(sequence)) => Ok(Segments { date, sequence }),
        _ => Err(CodeError::InvalidFormat(code.to_string())),
    }
}

/// Best-effort date segment, for codes that do not split cleanly.
///
/// Clamps to the end of `code` and yields `""` when the bounds land
/// outside the string or inside a multi-byte character.
pub fn best_effort_date<'a>(
    code: &'a str,
    prefix: &str,
    separator: &str,
    date_len: usize,
) -> &'a str {
    if let Ok(segments) = split_segments(code, prefix, separator, date_len) {
        return segments.date;
    }
    let start = (prefix.len() + separator.len()).min(code.len());
    let end = (start + date_len).min(code.len());
    code.get(start..end).unwrap_or("")
}
