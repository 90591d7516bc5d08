//! Generator configuration: defaults, JSON documents and `REFCODE_*` environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CodeError;

pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_SEQUENCE_WIDTH: usize = 4;
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// What happens to the numeric value when a sequence outgrows its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Grow the width and keep counting.
    #[default]
    Continue,
    /// Grow the width and restart at 1 (legacy behaviour).
    Reset,
}

impl OverflowPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Reset => "reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "continue" => Some(Self::Continue),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Settings for one code series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeConfig {
    pub prefix: String,
    #[serde(alias = "datePattern")]
    pub date_format: String,
    pub separator: String,
    #[serde(alias = "sequentialLength")]
    pub sequence_width: usize,
    pub time_zone: String,
    pub on_overflow: OverflowPolicy,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            separator: String::new(),
            sequence_width: DEFAULT_SEQUENCE_WIDTH,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            on_overflow: OverflowPolicy::Continue,
        }
    }
}

impl CodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn sequence_width(mut self, width: usize) -> Self {
        self.sequence_width = width;
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn on_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.on_overflow = policy;
        self
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, CodeError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CodeError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, CodeError> {
        Self::default().overlay_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, keyed by `REFCODE_*` variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CodeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay_lookup(lookup)
    }

    /// Override fields present in `lookup`, keeping the rest.
    pub fn overlay_lookup<F>(mut self, lookup: F) -> Result<Self, CodeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REFCODE_PREFIX") {
            self.prefix = v;
        }
        if let Some(v) = lookup("REFCODE_DATE_FORMAT") {
            self.date_format = v;
        }
        if let Some(v) = lookup("REFCODE_SEPARATOR") {
            self.separator = v;
        }
        if let Some(v) = lookup("REFCODE_SEQUENCE_WIDTH") {
            self.sequence_width = v.trim().parse().map_err(|_| {
                CodeError::ConfigurationError(format!(
                    "REFCODE_SEQUENCE_WIDTH is not an integer: {v}"
                ))
            })?;
        }
        if let Some(v) = lookup("REFCODE_TIME_ZONE") {
            self.time_zone = v;
        }
        if let Some(v) = lookup("REFCODE_ON_OVERFLOW") {
            self.on_overflow = OverflowPolicy::parse(v.trim()).ok_or_else(|| {
                CodeError::ConfigurationError(format!(
                    "REFCODE_ON_OVERFLOW must be continue or reset: {v}"
                ))
            })?;
        }
        Ok(self)
    }
}
