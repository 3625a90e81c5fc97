//! Execution control
//!
//! Data file generation, harness invocation, and the pipeline that runs
//! them inside one scoped set of temp files.

pub mod datafile;
pub mod harness;
pub mod pipeline;
