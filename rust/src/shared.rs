//! Thread-safe handle for stateful generation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::CodeConfig;
use crate::error::CodeError;
use crate::generator::CodeGenerator;

/// Cloneable handle that serializes `generate` across threads.
#[derive(Debug, Clone)]
pub struct SharedCodeGenerator {
    inner: Arc<Mutex<CodeGenerator>>,
}

impl SharedCodeGenerator {
    pub fn new(generator: CodeGenerator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(generator)),
        }
    }

    pub fn from_config(config: CodeConfig) -> Result<Self, CodeError> {
        Ok(Self::new(CodeGenerator::new(config)?))
    }

    /// Generate the next code under the lock.
    pub fn generate(&self) -> String {
        self.lock().generate()
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<R>(&self, f: impl FnOnce(&mut CodeGenerator) -> R) -> R {
        f(&mut self.lock())
    }

    // Generator state is consistent between calls, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CodeGenerator> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<CodeGenerator> for SharedCodeGenerator {
    fn from(generator: CodeGenerator) -> Self {
        Self::new(generator)
    }
}
