use std::path::PathBuf;

use thiserror::Error;

use crate::classifier::BackendError;

#[derive(Debug, Error)]
pub enum InstallError {
    /// A cancel was requested before the install started; nothing was touched.
    #[error("Install cancelled before it started")]
    Cancelled,
    /// The current model could not be copied aside; the slot is unchanged.
    #[error("Failed to back up {path} to {backup_path}: {source}")]
    BackupFailed {
        path: PathBuf,
        backup_path: PathBuf,
        source: std::io::Error,
    },
    /// Writing the new model failed; the previous model was put back.
    #[error("Failed to write new model to {path}: {source}")]
    ReplaceFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The written model does not load; the previous model was put back.
    #[error("Installed model at {path} failed to load: {cause}")]
    InstallVerificationFailed {
        path: PathBuf,
        #[source]
        cause: BackendError,
    },
    /// The slot could not be returned to a known-good state. Manual
    /// intervention is required: copy `backup_path` over the slot and check
    /// its SHA-256.
    #[error(
        "Restore failed: {reason} (backup: {}, expected sha256: {})",
        .backup_path.display(),
        .expected_sha256.as_deref().unwrap_or("unknown")
    )]
    RestoreFailed {
        backup_path: PathBuf,
        expected_sha256: Option<String>,
        reason: String,
    },
}
