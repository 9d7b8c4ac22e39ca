use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::classifier::ClassifierBackend;

/// The installed model file and its single-generation backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSlot {
    pub(super) path: PathBuf,
    pub(super) backup_path: PathBuf,
}

impl ModelSlot {
    /// Slot at `path`, backed up to `<path>.backup`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut backup: OsString = path.clone().into_os_string();
        backup.push(".backup");
        Self {
            path,
            backup_path: PathBuf::from(backup),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Inspect the installed file and its backup.
    pub fn status<B: ClassifierBackend>(&self, backend: &B) -> SlotStatus {
        SlotStatus {
            installed: FileStatus::inspect(&self.path, backend),
            backup: FileStatus::inspect(&self.backup_path, backend),
        }
    }
}

/// Snapshot of a slot, for reporting.
#[derive(Debug, Clone)]
pub struct SlotStatus {
    pub installed: Option<FileStatus>,
    pub backup: Option<FileStatus>,
}

#[derive(Debug, Clone)]
pub struct FileStatus {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub sha256: String,
    /// Why the backend refused to load the file, if it did.
    pub load_error: Option<String>,
}

impl FileStatus {
    fn inspect<B: ClassifierBackend>(path: &Path, backend: &B) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        let modified = std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
        Some(Self {
            size: bytes.len() as u64,
            modified,
            sha256: sha256_hex(&bytes),
            load_error: backend.decode(&bytes).err().map(|err| err.to_string()),
        })
    }

    pub fn is_loadable(&self) -> bool {
        self.load_error.is_none()
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NaiveBayesBackend;
    use tempfile::tempdir;

    #[test]
    fn backup_sits_next_to_the_slot() {
        let slot = ModelSlot::new("/models/sentiment.model");
        assert_eq!(slot.backup_path(), Path::new("/models/sentiment.model.backup"));
    }

    #[test]
    fn status_reports_missing_and_unloadable_files() {
        let dir = tempdir().unwrap();
        let slot = ModelSlot::new(dir.path().join("m.model"));
        let backend = NaiveBayesBackend::new();
        assert!(slot.status(&backend).installed.is_none());

        std::fs::write(slot.path(), b"garbage").unwrap();
        let status = slot.status(&backend);
        let installed = status.installed.unwrap();
        assert_eq!(installed.size, 7);
        assert!(!installed.is_loadable());
        assert!(status.backup.is_none());
    }

    #[test]
    fn sha256_is_lowercase_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
