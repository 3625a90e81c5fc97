/// Core types and structures for a randaudit run
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default number of samples written to the data file
pub const DEFAULT_LENGTH: u64 = 21_654_321;

/// Default harness test selector (run every test)
pub const DEFAULT_TEST_SELECTOR: &str = "-a";

/// Program name used when argv[0] is unavailable
pub const DEFAULT_PROGRAM_NAME: &str = "randaudit";

/// Exit code reserved for a run aborted by a signal
pub const EXIT_INTERRUPTED: i32 = 114;

/// Exit code reserved for an unhandled internal failure
pub const EXIT_INTERNAL: i32 = 116;

/// Immutable configuration of one run, parsed from the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of random samples to generate
    pub length: u64,
    /// Opaque selector forwarded to the test harness
    pub test_selector: String,
    /// Name used for the report file and diagnostics
    pub program_name: String,
}

impl RunConfig {
    pub fn new(length: u64, test_selector: impl Into<String>, program_name: impl Into<String>) -> Result<Self> {
        if length == 0 {
            return Err(AuditError::Config(
                "length must be a positive integer".to_string(),
            ));
        }

        let program_name = program_name.into();
        if program_name.is_empty() || program_name.contains('/') {
            return Err(AuditError::Config(format!(
                "invalid program name: {:?}",
                program_name
            )));
        }

        Ok(Self {
            length,
            test_selector: test_selector.into(),
            program_name,
        })
    }

    /// Report file path inside `report_dir`
    pub fn report_path(&self, report_dir: &std::path::Path) -> PathBuf {
        report_dir.join(format!("{}_report.txt", self.program_name))
    }
}

/// Outcome of a completed run
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Where the assembled report was written
    pub report_path: PathBuf,
    /// Number of samples written and verified
    pub samples: u64,
    /// Draws replaced by the fallback source
    pub substituted: u64,
    /// Wall-clock time from start to report completion
    pub elapsed: Duration,
}

/// Error types for randaudit operations
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Random source error: {reason}")]
    RandomSource {
        reason: String,
        exit_code: Option<i32>,
    },

    #[error("{}", describe_tool_failure(.status, .diagnostics))]
    ExternalTool {
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data file error: {0}")]
    DataFormat(String),
}

fn describe_tool_failure(status: &Option<i32>, diagnostics: &str) -> String {
    let head = match status {
        Some(code) => format!("Test harness exited with status {}", code),
        None => "Test harness failed".to_string(),
    };

    let diagnostics = diagnostics.trim_end();
    if diagnostics.is_empty() {
        head
    } else {
        format!("{}:\n{}", head, diagnostics)
    }
}

impl AuditError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            AuditError::Interrupted { .. } => EXIT_INTERRUPTED,
            AuditError::ExternalTool {
                status: Some(code), ..
            }
            | AuditError::RandomSource {
                exit_code: Some(code),
                ..
            } if (1..=255).contains(code) => *code,
            _ => EXIT_INTERNAL,
        }
    }
}

/// Result type for randaudit operations
pub type Result<T> = std::result::Result<T, AuditError>;
