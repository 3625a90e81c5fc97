//! randaudit: audit a random number source with an external statistical test harness
//!
//! One run draws `length` unsigned 32-bit integers, writes them to an ASCII
//! data file with a small key/value header, hands that file to the harness
//! (`-g 202 -f <file>`), and wraps the harness output in a report.
//!
//! # Architecture
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Run configuration, outcome, error taxonomy and exit codes
//! - [`config::settings`]: File and environment settings (harness, directories, source)
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::signal`]: Async-safe signal capture and cooperative cancellation
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::cleanup`]: Idempotent release ledger for temporary files
//! - [`safety::workspace`]: Run-scoped temporary file set
//!
//! ## Random Sources ([`source`])
//! - [`source::quantum`]: Remote quantum random number service
//! - [`source::os`]: Operating system entropy
//! - [`source::command`]: External helper process printing integers
//! - [`source::guarded`]: Retry and substitution policy around any source
//!
//! ## Execution ([`exec`])
//! - [`exec::datafile`]: Data file writer and verifier
//! - [`exec::harness`]: Harness invocation with output capture
//! - [`exec::pipeline`]: Stage ordering and cleanup on every exit path
//!
//! ## Utilities ([`utils`])
//! - [`utils::report`]: Report header, raw output and footer
//!
//! # Exit codes
//!
//! `0` success, the harness's own code when it fails, `114` when a signal
//! aborted the run, `116` for any other internal failure.

// Configuration
pub mod config;

// Kernel Primitives
pub mod kernel;

// Safety & Cleanup
pub mod safety;

// Random Sources
pub mod source;

// Execution
pub mod exec;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the randaudit binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
