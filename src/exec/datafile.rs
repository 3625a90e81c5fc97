/// Data file writer and verifier
///
/// Layout handed to the harness (`#` lines are comments to it):
///
/// ```text
/// # generator: randquantum
/// # seed: 0
/// type: d
/// count: 10
/// numbit: 32
/// 0
/// 1
/// ...
/// ```
use crate::config::types::{AuditError, Result};
use crate::kernel::signal::CancelToken;
use crate::source::RandomSource;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Header keys in their fixed order
pub const HEADER_KEYS: [&str; 5] = ["generator", "seed", "type", "count", "numbit"];

/// Header of a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileHeader {
    pub generator: String,
    pub seed: u64,
    pub count: u64,
    pub numbit: u32,
}

impl DataFileHeader {
    pub fn new(generator: impl Into<String>, seed: u64, count: u64) -> Self {
        Self {
            generator: generator.into(),
            seed,
            count,
            numbit: 32,
        }
    }

    /// The five header lines, each newline-terminated
    pub fn render(&self) -> String {
        format!(
            "# generator: {}\n# seed: {}\ntype: d\ncount: {}\nnumbit: {}\n",
            self.generator, self.seed, self.count, self.numbit
        )
    }
}

/// What the writer produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Data lines written
    pub lines: u64,
    /// Draws replaced by the source's fallback
    pub substituted: u64,
}

/// Write the header and `header.count` values drawn one at a time.
///
/// Cancellation is checked before every draw. Any failed draw aborts the
/// write, so a file that is handed on always has exactly `count` lines.
pub fn write_data_file(
    path: &Path,
    header: &DataFileHeader,
    source: &mut dyn RandomSource,
    cancel: &CancelToken,
    progress_interval: u64,
) -> Result<WriteSummary> {
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| {
            AuditError::Resource(format!(
                "Failed to open data file {}: {}",
                path.display(),
                e
            ))
        })?;
    let mut out = BufWriter::new(file);

    out.write_all(header.render().as_bytes())?;

    info!(
        "Drawing {} values from {} into {}",
        header.count,
        source.name(),
        path.display()
    );

    for written in 0..header.count {
        cancel.check()?;
        let value = source.draw(u32::MAX)?;
        writeln!(out, "{}", value)?;

        if progress_interval > 0 && (written + 1) % progress_interval == 0 {
            debug!("{} of {} values written", written + 1, header.count);
        }
    }

    out.flush()?;
    out.get_ref().sync_all()?;

    Ok(WriteSummary {
        lines: header.count,
        substituted: source.substitutions(),
    })
}

/// Stream a data file back and check it: five header keys in order, then
/// exactly `count` lines each matching `^[0-9]+$` and below 2^32.
/// Returns the parsed header.
pub fn verify_data_file(path: &Path) -> Result<DataFileHeader> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let mut fields = Vec::with_capacity(HEADER_KEYS.len());
    for key in HEADER_KEYS {
        let line = lines
            .next()
            .transpose()?
            .ok_or_else(|| format_error(format!("missing header key '{}'", key)))?;
        fields.push(parse_header_line(&line, key)?);
    }

    if fields[2] != "d" {
        return Err(format_error(format!("unsupported type '{}'", fields[2])));
    }
    let header = DataFileHeader {
        generator: fields[0].clone(),
        seed: parse_field(&fields[1], "seed")?,
        count: parse_field(&fields[3], "count")?,
        numbit: parse_field(&fields[4], "numbit")?,
    };

    let mut seen: u64 = 0;
    for (index, line) in lines.enumerate() {
        let line = line?;
        if !is_u32_decimal(&line) {
            return Err(format_error(format!(
                "data line {} is not an unsigned 32-bit integer: {:?}",
                index + 1,
                line
            )));
        }
        seen += 1;
    }

    if seen != header.count {
        return Err(format_error(format!(
            "header count {} but {} data lines",
            header.count, seen
        )));
    }

    Ok(header)
}

fn parse_header_line(line: &str, key: &str) -> Result<String> {
    let body = line.strip_prefix("# ").unwrap_or(line);
    let (found, value) = body
        .split_once(':')
        .ok_or_else(|| format_error(format!("malformed header line {:?}", line)))?;
    if found != key {
        return Err(format_error(format!(
            "expected header key '{}', found '{}'",
            key, found
        )));
    }
    Ok(value.trim().to_string())
}

fn parse_field<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| format_error(format!("invalid {} value '{}'", key, value)))
}

fn is_u32_decimal(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) && line.parse::<u32>().is_ok()
}

fn format_error(message: String) -> AuditError {
    AuditError::DataFormat(message)
}
