//! Random sources
//!
//! The data file writer only sees [`RandomSource`]. How integers are
//! produced (quantum service, OS entropy, external helper, fixed list) is
//! chosen from settings by [`build_source`].

pub mod command;
pub mod guarded;
pub mod os;
pub mod quantum;
pub mod sequence;

use crate::config::settings::{Settings, SourceKind};
use crate::config::types::{AuditError, Result};
use std::time::Duration;
use thiserror::Error;

pub use command::CommandSource;
pub use guarded::GuardedSource;
pub use os::OsEntropySource;
pub use quantum::QuantumSource;
pub use sequence::SequenceSource;

/// Failure of a single draw
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("draw timed out after {0:?}")]
    Timeout(Duration),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed value: {0}")]
    Malformed(String),

    #[error("source exhausted")]
    Exhausted,

    #[error("helper exited with status {0:?}")]
    Exited(Option<i32>),
}

impl From<SourceError> for AuditError {
    fn from(err: SourceError) -> Self {
        let exit_code = match err {
            SourceError::Exited(code) => code,
            _ => None,
        };
        AuditError::RandomSource {
            reason: err.to_string(),
            exit_code,
        }
    }
}

/// A producer of unsigned 32-bit integers
pub trait RandomSource {
    /// Short name for logs
    fn name(&self) -> &str;

    /// One uniformly distributed 32-bit value
    fn next_u32(&mut self) -> std::result::Result<u32, SourceError>;

    /// One value uniformly distributed in `[0, bound]`
    fn draw(&mut self, bound: u32) -> std::result::Result<u32, SourceError> {
        if bound == u32::MAX {
            return self.next_u32();
        }

        // Reject the top partial zone so every residue is equally likely
        let range = bound as u64 + 1;
        let zone = (1u64 << 32) - ((1u64 << 32) % range);
        loop {
            let value = self.next_u32()? as u64;
            if value < zone {
                return Ok((value % range) as u32);
            }
        }
    }

    /// Draws replaced by a fallback source so far
    fn substitutions(&self) -> u64 {
        0
    }
}

/// Build the configured source wrapped in the failed-draw policy
pub fn build_source(settings: &Settings) -> Result<GuardedSource> {
    let inner: Box<dyn RandomSource> = match settings.source {
        SourceKind::Quantum => Box::new(QuantumSource::new(
            &settings.quantum_url,
            settings.draw_timeout(),
        )?),
        SourceKind::Os => Box::new(OsEntropySource::new()),
        SourceKind::Command => {
            let program = settings.helper_program.as_deref().ok_or_else(|| {
                AuditError::Config("command source requires a helper program".to_string())
            })?;
            Box::new(CommandSource::spawn(
                program,
                &settings.helper_args,
                settings.draw_timeout(),
            )?)
        }
    };

    Ok(GuardedSource::new(
        inner,
        settings.max_retries,
        settings.on_failure,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_full_range_passes_value_through() {
        let mut source = SequenceSource::new(vec![0, 7, u32::MAX]);
        assert_eq!(source.draw(u32::MAX).unwrap(), 0);
        assert_eq!(source.draw(u32::MAX).unwrap(), 7);
        assert_eq!(source.draw(u32::MAX).unwrap(), u32::MAX);
    }

    #[test]
    fn test_draw_bounded_stays_in_range() {
        let mut source = OsEntropySource::new();
        for _ in 0..1000 {
            assert!(source.draw(9).unwrap() <= 9);
        }
    }

    #[test]
    fn test_draw_rejects_biased_zone() {
        // bound 2 -> range 3; u32::MAX falls in the rejected zone
        let mut source = SequenceSource::new(vec![u32::MAX, 5]);
        assert_eq!(source.draw(2).unwrap(), 2);
    }

    #[test]
    fn test_exit_code_carried_into_audit_error() {
        let err: AuditError = SourceError::Exited(Some(9)).into();
        assert_eq!(err.exit_code(), 9);

        let err: AuditError = SourceError::Timeout(Duration::from_secs(7)).into();
        assert_eq!(err.exit_code(), 116);
    }

    #[test]
    fn test_build_os_source() {
        let settings = Settings {
            source: SourceKind::Os,
            ..Settings::default()
        };
        let mut source = build_source(&settings).unwrap();
        assert_eq!(source.name(), "os");
        source.next_u32().unwrap();
    }
}
