//! refcode: short human-readable reference codes with date-scoped sequences.
//!
//! A code is a prefix, a formatted calendar date in an IANA time zone, and a
//! zero-padded sequence that restarts whenever the formatted date changes.
//!
//! # Format
//!
//! ```text
//! CODE ::= PREFIX [ SEP ] DATE [ SEP ] SEQUENCE
//! ```
//!
//! # Example
//!
//! ```
//! use refcode::{CodeConfig, CodeGenerator};
//!
//! let config = CodeConfig::new().prefix("INV").separator("-");
//! let mut code_gen = CodeGenerator::new(config).expect("valid generator config");
//! let code = code_gen.generate();
//! println!("{}", code); // e.g., "INV-20250101-0001"
//!
//! let next = code_gen.increment(&code).expect("generated codes are valid");
//! assert_eq!(code_gen.extract_sequence(&next), Some(2));
//! ```
//!
//! Stateful mode keeps the last date key and sequence in the generator.
//! Stateless mode keeps them elsewhere (e.g. a database row) and uses
//! [`CodeGenerator::generate_from_sequence`] or [`CodeGenerator::increment`].

mod async_api;
mod clock;
mod config;
mod error;
mod generator;
mod segments;
mod shared;

pub use async_api::{async_code_batch, async_generate_from_sequence, async_increment};
pub use clock::{
    Clock, FixedClock, SystemClock, format_instant, is_calendar_date, parse_time_zone,
    validate_pattern,
};
pub use config::{
    CodeConfig, DEFAULT_DATE_FORMAT, DEFAULT_SEQUENCE_WIDTH, DEFAULT_TIME_ZONE, OverflowPolicy,
};
pub use error::CodeError;
pub use generator::{CodeGenerator, GeneratorState, ParsedCode};
pub use segments::{
    Segments, best_effort_date, compose, digit_count, is_sequence_segment, pad_sequence,
    parse_sequence, split_segments,
};
pub use shared::SharedCodeGenerator;
