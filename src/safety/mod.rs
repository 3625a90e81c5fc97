//! Safety and cleanup
//!
//! Temp files are recorded in a ledger as they are created and released
//! idempotently on every exit path.

pub mod cleanup;
pub mod workspace;
