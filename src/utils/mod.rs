//! Utilities
//!
//! - [`report`]: report file assembly around raw harness output

pub mod report;
