/// Report assembly
/// Header line and report-path line first, then the harness output
/// verbatim, then a footer with elapsed seconds and the sample count. The
/// report is append-only during a run and synced to disk before anyone
/// reads it.
use crate::config::types::{AuditError, Result, RunConfig};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timestamp layout in the header, e.g. `Mon Oct 19 14:03:27 2026`
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub struct ReportWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ReportWriter {
    /// Create (or truncate) the report and write the header block
    pub fn create(path: &Path, config: &RunConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                AuditError::Resource(format!(
                    "Failed to create report {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let mut writer = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        writer.out.write_all(header_line(config, &timestamp).as_bytes())?;
        writeln!(writer.out, "Report: {}", path.display())?;
        writer.out.flush()?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the harness output exactly as captured
    pub fn append_raw(&mut self, captured: &Path) -> Result<u64> {
        let mut input = File::open(captured)?;
        let copied = io::copy(&mut input, &mut self.out)?;
        self.out.flush()?;
        Ok(copied)
    }

    /// Write the footer, flush and sync; the report is complete afterwards
    pub fn finish(mut self, config: &RunConfig, elapsed: Duration, samples: u64, substituted: u64) -> Result<PathBuf> {
        self.out
            .write_all(footer_line(config, elapsed, samples, substituted).as_bytes())?;
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(self.path)
    }
}

/// `<program>: length <n>, tests "<selector>", started <timestamp>`
pub fn header_line(config: &RunConfig, timestamp: &str) -> String {
    format!(
        "{}: length {}, tests \"{}\", started {}\n",
        config.program_name, config.length, config.test_selector, timestamp
    )
}

/// `<program>: finished in <secs> seconds for <count> samples.`
/// A substitution note is appended when any draw was replaced.
pub fn footer_line(config: &RunConfig, elapsed: Duration, samples: u64, substituted: u64) -> String {
    let mut line = format!(
        "{}: finished in {} seconds for {} samples.",
        config.program_name,
        elapsed.as_secs(),
        samples
    );
    if substituted > 0 {
        line.push_str(&format!(
            " {} draws were substituted with OS entropy.",
            substituted
        ));
    }
    line.push('\n');
    line
}
