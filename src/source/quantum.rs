/// Quantum random numbers from the ANU QRNG JSON API
/// Each request returns up to 1024 values in `[0, 65535]`; two consecutive
/// values form one 32-bit draw, high half first.
use super::{RandomSource, SourceError};
use crate::config::types::{AuditError, Result};
use log::debug;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Response body, e.g.
/// `{"type":"uint16","length":3,"data":[7731,40732,1971],"success":true}`
#[derive(Debug, Deserialize)]
pub struct QuantumBatch {
    #[serde(rename = "type")]
    pub kind: String,
    pub length: usize,
    pub data: Vec<u32>,
    pub success: bool,
}

impl QuantumBatch {
    /// Validate and narrow a response to its 16-bit values
    pub fn into_values(self) -> std::result::Result<Vec<u16>, SourceError> {
        if !self.success {
            return Err(SourceError::Unavailable(
                "quantum service reported failure".to_string(),
            ));
        }
        if self.kind != "uint16" {
            return Err(SourceError::Malformed(format!(
                "expected uint16 batch, got {}",
                self.kind
            )));
        }
        if self.data.len() != self.length {
            return Err(SourceError::Malformed(format!(
                "batch length {} but {} values",
                self.length,
                self.data.len()
            )));
        }

        self.data
            .into_iter()
            .map(|v| u16::try_from(v).map_err(|_| SourceError::Malformed(v.to_string())))
            .collect()
    }
}

pub struct QuantumSource {
    client: reqwest::blocking::Client,
    url: String,
    timeout: Duration,
    buffer: VecDeque<u16>,
    batches: u64,
}

impl QuantumSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::RandomSource {
                reason: format!("Failed to build quantum service client: {}", e),
                exit_code: None,
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
            buffer: VecDeque::new(),
            batches: 0,
        })
    }

    fn fetch(&mut self) -> std::result::Result<(), SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout(self.timeout)
                } else {
                    SourceError::Unavailable(e.to_string())
                }
            })?;

        let batch: QuantumBatch = response
            .json()
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let values = batch.into_values()?;
        if values.is_empty() {
            return Err(SourceError::Malformed("empty batch".to_string()));
        }

        self.batches += 1;
        debug!("Quantum batch {} with {} values", self.batches, values.len());
        self.buffer.extend(values);
        Ok(())
    }

    fn next_u16(&mut self) -> std::result::Result<u16, SourceError> {
        if self.buffer.is_empty() {
            self.fetch()?;
        }
        self.buffer.pop_front().ok_or(SourceError::Exhausted)
    }
}

impl RandomSource for QuantumSource {
    fn name(&self) -> &str {
        "quantum"
    }

    fn next_u32(&mut self) -> std::result::Result<u32, SourceError> {
        // Take both halves before committing so a failed fetch loses nothing
        if self.buffer.len() < 2 {
            self.fetch()?;
        }
        let high = self.next_u16()? as u32;
        let low = self.next_u16()? as u32;
        Ok((high << 16) | low)
    }
}
