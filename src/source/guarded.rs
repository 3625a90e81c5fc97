/// Failed-draw policy
/// A failed draw is retried `max_retries` times. After that the run either
/// fails, or the value is replaced by one OS-entropy draw; replacements are
/// logged and counted so the report can disclose them.
use super::{OsEntropySource, RandomSource, SourceError};
use crate::config::settings::FailurePolicy;
use log::warn;

pub struct GuardedSource {
    inner: Box<dyn RandomSource>,
    fallback: OsEntropySource,
    max_retries: u32,
    policy: FailurePolicy,
    substituted: u64,
    retried: u64,
}

impl GuardedSource {
    pub fn new(inner: Box<dyn RandomSource>, max_retries: u32, policy: FailurePolicy) -> Self {
        Self {
            inner,
            fallback: OsEntropySource::new(),
            max_retries,
            policy,
            substituted: 0,
            retried: 0,
        }
    }

    /// Total retries performed so far
    pub fn retries(&self) -> u64 {
        self.retried
    }
}

impl RandomSource for GuardedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next_u32(&mut self) -> Result<u32, SourceError> {
        let mut attempt = 0;
        let last_error = loop {
            match self.inner.next_u32() {
                Ok(value) => return Ok(value),
                // Retrying cannot revive a finished source
                Err(e @ (SourceError::Exhausted | SourceError::Exited(_))) => break e,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    self.retried += 1;
                    warn!(
                        "{} draw failed ({}), retry {}/{}",
                        self.inner.name(),
                        e,
                        attempt,
                        self.max_retries
                    );
                }
                Err(e) => break e,
            }
        };

        match self.policy {
            FailurePolicy::Fail => Err(last_error),
            FailurePolicy::Substitute => {
                let value = self.fallback.next_u32()?;
                self.substituted += 1;
                warn!(
                    "{} draw failed ({}); substituted OS entropy (substitution #{})",
                    self.inner.name(),
                    last_error,
                    self.substituted
                );
                Ok(value)
            }
        }
    }

    fn substitutions(&self) -> u64 {
        self.substituted
    }
}
