/// Ambient settings: harness location, temp directories, random source and
/// failed-draw policy. Loaded from an optional JSON file, then overridden by
/// `RANDAUDIT_*` environment variables.
use crate::config::types::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a JSON settings file
pub const CONFIG_ENV: &str = "RANDAUDIT_CONFIG";

/// ANU quantum random number service, 1024 uint16 values per request
pub const DEFAULT_QUANTUM_URL: &str = "https://qrng.anu.edu.au/API/jsonI.php?length=1024&type=uint16";

const VOLATILE_CANDIDATE: &str = "/dev/shm";

/// Which random source fills the data file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Quantum,
    Os,
    Command,
}

impl std::str::FromStr for SourceKind {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "quantum" => Ok(SourceKind::Quantum),
            "os" => Ok(SourceKind::Os),
            "command" => Ok(SourceKind::Command),
            other => Err(AuditError::Config(format!(
                "unknown random source '{}' (expected quantum, os or command)",
                other
            ))),
        }
    }
}

/// What to do once a draw has failed and its retries are used up
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the run with a random source error
    Fail,
    /// Replace the draw with operating-system entropy and disclose it
    Substitute,
}

impl std::str::FromStr for FailurePolicy {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fail" => Ok(FailurePolicy::Fail),
            "substitute" => Ok(FailurePolicy::Substitute),
            other => Err(AuditError::Config(format!(
                "unknown failure policy '{}' (expected fail or substitute)",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Harness executable
    pub harness_program: String,
    /// Arguments placed before the test selector
    pub harness_args: Vec<String>,
    /// Generic temp directory (data file and report)
    pub temp_dir: Option<PathBuf>,
    /// Fast/volatile temp directory (scratch files)
    pub volatile_dir: Option<PathBuf>,
    pub source: SourceKind,
    pub quantum_url: String,
    /// Helper command line for the `command` source
    pub helper_program: Option<String>,
    pub helper_args: Vec<String>,
    pub draw_timeout_ms: u64,
    pub max_retries: u32,
    pub on_failure: FailurePolicy,
    /// Generator name recorded in the data file header
    pub generator_name: String,
    pub seed: u64,
    /// Copy the finished report to stdout
    pub display_report: bool,
    /// Draws between progress log lines
    pub progress_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            harness_program: "dieharder".to_string(),
            harness_args: Vec::new(),
            temp_dir: None,
            volatile_dir: None,
            source: SourceKind::Quantum,
            quantum_url: DEFAULT_QUANTUM_URL.to_string(),
            helper_program: None,
            helper_args: Vec::new(),
            draw_timeout_ms: 7_000,
            max_retries: 2,
            on_failure: FailurePolicy::Fail,
            generator_name: "randquantum".to_string(),
            seed: 0,
            display_report: true,
            progress_interval: 1_000_000,
        }
    }
}

impl Settings {
    /// Load settings for this process: `RANDAUDIT_CONFIG` file, then environment
    pub fn load() -> Result<Self> {
        let base = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        // Non-UTF-8 entries are never RANDAUDIT_* keys
        base.with_overrides(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Parse a JSON settings file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AuditError::Config(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply `RANDAUDIT_*` overrides from a key/value iterator
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "RANDAUDIT_HARNESS" => {
                    let (program, args) = split_command_line(value, "RANDAUDIT_HARNESS")?;
                    self.harness_program = program;
                    self.harness_args = args;
                }
                "RANDAUDIT_TMPDIR" => self.temp_dir = Some(PathBuf::from(value)),
                "RANDAUDIT_VOLATILE_DIR" => self.volatile_dir = Some(PathBuf::from(value)),
                "RANDAUDIT_SOURCE" => self.source = value.parse()?,
                "RANDAUDIT_HELPER" => {
                    let (program, args) = split_command_line(value, "RANDAUDIT_HELPER")?;
                    self.helper_program = Some(program);
                    self.helper_args = args;
                }
                "RANDAUDIT_QUANTUM_URL" => self.quantum_url = value.to_string(),
                "RANDAUDIT_DRAW_TIMEOUT_MS" => {
                    self.draw_timeout_ms = parse_number(value, "RANDAUDIT_DRAW_TIMEOUT_MS")?
                }
                "RANDAUDIT_RETRIES" => self.max_retries = parse_number(value, "RANDAUDIT_RETRIES")?,
                "RANDAUDIT_ON_FAILURE" => self.on_failure = value.parse()?,
                "RANDAUDIT_DISPLAY" => self.display_report = parse_flag(value, "RANDAUDIT_DISPLAY")?,
                _ => {}
            }
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.harness_program.trim().is_empty() {
            return Err(AuditError::Config("harness program is empty".to_string()));
        }
        if self.draw_timeout_ms == 0 {
            return Err(AuditError::Config("draw timeout must be positive".to_string()));
        }
        if self.source == SourceKind::Command && self.helper_program.is_none() {
            return Err(AuditError::Config(
                "command source selected but no helper configured (set RANDAUDIT_HELPER)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn draw_timeout(&self) -> Duration {
        Duration::from_millis(self.draw_timeout_ms)
    }

    /// Generic temp directory for the data file and the report
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Volatile directory for scratch files, falling back to the generic one
    pub fn volatile_dir(&self) -> PathBuf {
        if let Some(dir) = &self.volatile_dir {
            return dir.clone();
        }
        let candidate = Path::new(VOLATILE_CANDIDATE);
        if candidate.is_dir() {
            candidate.to_path_buf()
        } else {
            self.temp_dir()
        }
    }
}

fn split_command_line(value: &str, key: &str) -> Result<(String, Vec<String>)> {
    let mut words = value.split_whitespace().map(str::to_string);
    let program = words
        .next()
        .ok_or_else(|| AuditError::Config(format!("{} is empty", key)))?;
    Ok((program, words.collect()))
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AuditError::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_flag(value: &str, key: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(AuditError::Config(format!("{} must be 0 or 1, got '{}'", key, other))),
    }
}
