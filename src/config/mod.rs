//! Configuration
//!
//! Run configuration, settings loading, and the shared error taxonomy.

pub mod settings;
pub mod types;
