/// Cleanup and resource tracking
/// Every temp file is recorded immediately after creation and removed in
/// reverse creation order. Removal is idempotent: a file that is already
/// gone counts as cleaned.
use crate::config::types::{AuditError, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Kinds of temporary file owned by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Random integers handed to the harness
    Data,
    /// Harness standard output before it is copied into the report
    ScratchMem,
    /// Harness standard error
    ScratchErr,
}

impl ResourceKind {
    /// Short tag used in file names
    pub fn tag(self) -> &'static str {
        match self {
            ResourceKind::Data => "data",
            ResourceKind::ScratchMem => "mem",
            ResourceKind::ScratchErr => "err",
        }
    }
}

/// Resource ledger entry
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub kind: ResourceKind,
    pub path: PathBuf,
    pub created_at: std::time::SystemTime,
}

/// Resource ledger for tracking created temp files
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: Vec<ResourceEntry>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record resource creation
    /// Must be called immediately after successful creation
    pub fn record(&mut self, kind: ResourceKind, path: PathBuf) {
        let entry = ResourceEntry {
            kind,
            path,
            created_at: std::time::SystemTime::now(),
        };

        debug!("Recording resource: {:?}", entry);
        self.entries.push(entry);
    }

    /// Path of the first entry of a kind
    pub fn path_of(&self, kind: ResourceKind) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.path.as_path())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Remove every recorded file in reverse creation order
    /// Idempotent: entries are dropped from the ledger once handled, and a
    /// missing file is not an error. Failed removals stay in the ledger so a
    /// later call can retry them.
    pub fn release_all(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            debug!("Nothing to release");
            return Ok(());
        }

        info!("Releasing {} temporary files", self.entries.len());

        let mut failed = Vec::new();
        while let Some(entry) = self.entries.pop() {
            if let Err(e) = remove_file_idempotent(&entry.path) {
                warn!("Failed to remove {}: {}", entry.path.display(), e);
                failed.push(entry);
            }
        }

        if failed.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = failed.iter().map(|e| e.path.display().to_string()).collect();
        failed.reverse();
        self.entries = failed;
        Err(AuditError::Resource(format!(
            "Cleanup failed for {} files: {:?}",
            names.len(),
            names
        )))
    }
}

/// Remove a file, treating "already gone" as success
pub fn remove_file_idempotent(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Already removed: {}", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ledger() {
        let mut ledger = ResourceLedger::new();
        assert!(ledger.is_empty());

        ledger.record(ResourceKind::Data, PathBuf::from("/tmp/randaudit-test-data"));
        assert_eq!(ledger.count(), 1);
        assert_eq!(
            ledger.path_of(ResourceKind::Data),
            Some(Path::new("/tmp/randaudit-test-data"))
        );
        assert_eq!(ledger.path_of(ResourceKind::ScratchErr), None);
    }

    #[test]
    fn test_release_removes_and_empties() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.txt");
        let err = dir.path().join("err.txt");
        fs::write(&data, b"x").unwrap();
        fs::write(&err, b"").unwrap();

        let mut ledger = ResourceLedger::new();
        ledger.record(ResourceKind::Data, data.clone());
        ledger.record(ResourceKind::ScratchErr, err.clone());

        ledger.release_all().unwrap();
        assert!(!data.exists());
        assert!(!err.exists());
        assert!(ledger.is_empty());

        // Second release is a no-op
        ledger.release_all().unwrap();
    }

    #[test]
    fn test_release_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ResourceLedger::new();
        ledger.record(ResourceKind::ScratchMem, dir.path().join("never-created"));
        assert!(ledger.release_all().is_ok());
    }

    #[test]
    fn test_remove_file_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"1").unwrap();
        remove_file_idempotent(&path).unwrap();
        remove_file_idempotent(&path).unwrap();
    }
}
