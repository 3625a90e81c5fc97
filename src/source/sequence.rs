use super::{RandomSource, SourceError};
use std::collections::VecDeque;

/// Replays a fixed list of values, then reports `Exhausted`
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: VecDeque<u32>,
}

impl SequenceSource {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Values not yet drawn
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for SequenceSource {
    fn name(&self) -> &str {
        "sequence"
    }

    fn next_u32(&mut self) -> Result<u32, SourceError> {
        self.values.pop_front().ok_or(SourceError::Exhausted)
    }
}
