/// Run-scoped temporary files
/// Three uniquely named files per run: the data file in the generic temp
/// directory and two scratch files in the volatile one. Released on every
/// exit path: explicitly by the pipeline, and by `Drop` on unwind.
use crate::config::types::{AuditError, Result};
use crate::safety::cleanup::{ResourceKind, ResourceLedger};
use log::{info, warn};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique file name for one resource of one run
/// The suffix is a random v4 UUID, so concurrent runs never collide.
pub fn unique_file_name(program_name: &str, kind: ResourceKind) -> String {
    format!(
        "{}-{}-{}.txt",
        program_name,
        kind.tag(),
        Uuid::new_v4().simple()
    )
}

/// The temporary files owned by one run
#[derive(Debug)]
pub struct RunFiles {
    data: PathBuf,
    scratch_mem: PathBuf,
    scratch_err: PathBuf,
    ledger: ResourceLedger,
}

impl RunFiles {
    /// Create the data file in `temp_dir` and both scratch files in
    /// `volatile_dir`, falling back to `temp_dir` if the volatile directory
    /// refuses the file.
    pub fn acquire(program_name: &str, temp_dir: &Path, volatile_dir: &Path) -> Result<Self> {
        let mut ledger = ResourceLedger::new();

        let outcome = (|| -> Result<(PathBuf, PathBuf, PathBuf)> {
            let data = create_in(&mut ledger, program_name, ResourceKind::Data, temp_dir, None)?;
            let scratch_mem = create_in(
                &mut ledger,
                program_name,
                ResourceKind::ScratchMem,
                volatile_dir,
                Some(temp_dir),
            )?;
            let scratch_err = create_in(
                &mut ledger,
                program_name,
                ResourceKind::ScratchErr,
                volatile_dir,
                Some(temp_dir),
            )?;
            Ok((data, scratch_mem, scratch_err))
        })();

        match outcome {
            Ok((data, scratch_mem, scratch_err)) => {
                info!(
                    "Acquired temp files: data={} mem={} err={}",
                    data.display(),
                    scratch_mem.display(),
                    scratch_err.display()
                );
                Ok(Self {
                    data,
                    scratch_mem,
                    scratch_err,
                    ledger,
                })
            }
            Err(e) => {
                // Undo partial acquisition before reporting
                if let Err(cleanup) = ledger.release_all() {
                    warn!("Cleanup after failed acquisition: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    pub fn data(&self) -> &Path {
        &self.data
    }

    pub fn scratch_mem(&self) -> &Path {
        &self.scratch_mem
    }

    pub fn scratch_err(&self) -> &Path {
        &self.scratch_err
    }

    /// Remove all three files (idempotent)
    pub fn release(&mut self) -> Result<()> {
        self.ledger.release_all()
    }

    /// True once every file has been released
    pub fn is_released(&self) -> bool {
        self.ledger.is_empty()
    }
}

impl Drop for RunFiles {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Temp file cleanup on drop failed: {}", e);
        }
    }
}

fn create_in(
    ledger: &mut ResourceLedger,
    program_name: &str,
    kind: ResourceKind,
    dir: &Path,
    fallback: Option<&Path>,
) -> Result<PathBuf> {
    match create_exclusive(&dir.join(unique_file_name(program_name, kind))) {
        Ok(path) => {
            ledger.record(kind, path.clone());
            Ok(path)
        }
        Err(e) => match fallback {
            Some(fallback) if fallback != dir => {
                warn!(
                    "Cannot create {} file in {} ({}), using {}",
                    kind.tag(),
                    dir.display(),
                    e,
                    fallback.display()
                );
                create_in(ledger, program_name, kind, fallback, None)
            }
            _ => Err(AuditError::Resource(format!(
                "Failed to create {} file in {}: {}",
                kind.tag(),
                dir.display(),
                e
            ))),
        },
    }
}

fn create_exclusive(path: &Path) -> std::io::Result<PathBuf> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    Ok(path.to_path_buf())
}
