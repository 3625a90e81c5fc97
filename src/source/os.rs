use super::{RandomSource, SourceError};
use rand::rngs::OsRng;
use rand::RngCore;

/// Operating-system entropy
#[derive(Debug, Clone, Default)]
pub struct OsEntropySource;

impl OsEntropySource {
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for OsEntropySource {
    fn name(&self) -> &str {
        "os"
    }

    fn next_u32(&mut self) -> Result<u32, SourceError> {
        let mut buf = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(u32::from_le_bytes(buf))
    }
}
