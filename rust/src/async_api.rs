//! Async convenience API built on top of the sync generator.
//!
//! Each call builds a fresh generator, so these suit stateless mode where the
//! sequence lives in external storage.

use crate::{CodeConfig, CodeError, CodeGenerator};

/// Render one code for a caller-tracked sequence in async contexts.
pub async fn async_generate_from_sequence(
    config: CodeConfig,
    sequence: u64,
    date_key: Option<&str>,
) -> Result<String, CodeError> {
    let generator = CodeGenerator::new(config)?;
    generator.generate_from_sequence(sequence, date_key)
}

/// Derive the code following `code` in async contexts.
pub async fn async_increment(config: CodeConfig, code: &str) -> Result<String, CodeError> {
    let generator = CodeGenerator::new(config)?;
    generator.increment(code)
}

/// Generate a finite batch of consecutive codes as a vector.
pub async fn async_code_batch(config: CodeConfig, count: usize) -> Result<Vec<String>, CodeError> {
    let mut generator = CodeGenerator::new(config)?;
    Ok(generator.next_n(count))
}
