//! Thin wrappers around process-level kernel primitives.

pub mod signal;
