use std::io;
use std::path::{Path, PathBuf};

use super::InstallError;
use super::slot::{ModelSlot, sha256_hex};
use crate::atomic_write::write_atomic;
use crate::cancel::{CancelLock, CancelToken};
use crate::classifier::{ClassifierBackend, ModelArtifact};

/// Install state machine. `Failed` is terminal for the run and tells whether
/// the slot was left untouched, put back, or could not be put back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Idle,
    BackingUp,
    Replacing,
    Verifying,
    Committed,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Failed before the slot was written.
    NoOp,
    /// The previous contents were restored.
    RolledBack,
    /// Rollback itself failed; see [`InstallError::RestoreFailed`].
    Indeterminate,
}

impl InstallPhase {
    pub fn label(&self) -> &'static str {
        match self {
            InstallPhase::Idle => "idle",
            InstallPhase::BackingUp => "backing up",
            InstallPhase::Replacing => "replacing",
            InstallPhase::Verifying => "verifying",
            InstallPhase::Committed => "committed",
            InstallPhase::Failed(FailureKind::NoOp) => "failed (slot unchanged)",
            InstallPhase::Failed(FailureKind::RolledBack) => "failed (rolled back)",
            InstallPhase::Failed(FailureKind::Indeterminate) => "failed (rollback failed)",
        }
    }
}

/// Facts about a committed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub path: PathBuf,
    /// Set when a previous model existed and was copied aside.
    pub backup_path: Option<PathBuf>,
    pub sha256: String,
    pub size: u64,
}

/// Facts about a restore from backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub path: PathBuf,
    pub sha256: String,
}

/// Previous slot contents copied aside during BackingUp.
struct PriorModel {
    sha256: String,
}

/// Replaces the model in a slot, verifying through the backend and rolling
/// back on failure.
///
/// A committed model is seen only by code that loads the slot afterwards; a
/// [`crate::classifier::ModelHandle`] loaded earlier keeps the old parameters
/// until it is reloaded.
pub struct ModelInstaller<'a, B: ClassifierBackend> {
    slot: &'a mut ModelSlot,
    backend: &'a B,
    cancel: Option<CancelToken>,
}

impl<'a, B: ClassifierBackend> ModelInstaller<'a, B> {
    /// The slot is borrowed mutably so no other installer can touch it
    /// while this one exists.
    pub fn new(slot: &'a mut ModelSlot, backend: &'a B) -> Self {
        Self {
            slot,
            backend,
            cancel: None,
        }
    }

    /// Fail with `Cancelled` if a cancel is pending, otherwise refuse
    /// requests while in flight.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Install `artifact` through a temp-file-and-rename write.
    pub fn install<F>(&mut self, artifact: &ModelArtifact, on_phase: F) -> Result<InstallReport, InstallError>
    where
        F: FnMut(InstallPhase),
    {
        self.install_with_writer(artifact, on_phase, write_atomic)
    }

    /// Install `artifact`, using `writer` for the Replacing step.
    pub fn install_with_writer<F, W>(
        &mut self,
        artifact: &ModelArtifact,
        mut on_phase: F,
        mut writer: W,
    ) -> Result<InstallReport, InstallError>
    where
        F: FnMut(InstallPhase),
        W: FnMut(&Path, &[u8]) -> io::Result<()>,
    {
        let cancel = self.cancel.clone();
        let _lock = hold_cancel(cancel.as_ref())?;
        let mut enter = |phase: InstallPhase| {
            tracing::info!("Model install: {}", phase.label());
            on_phase(phase);
        };

        enter(InstallPhase::BackingUp);
        let prior = match self.back_up() {
            Ok(prior) => prior,
            Err(err) => {
                enter(InstallPhase::Failed(FailureKind::NoOp));
                return Err(err);
            }
        };

        enter(InstallPhase::Replacing);
        if let Err(source) = writer(self.slot.path.as_path(), artifact.as_bytes()) {
            let error = InstallError::ReplaceFailed {
                path: self.slot.path.clone(),
                source,
            };
            return Err(self.roll_back(prior.as_ref(), error, &mut enter));
        }

        enter(InstallPhase::Verifying);
        if let Err(cause) = self.backend.load(&self.slot.path) {
            let error = InstallError::InstallVerificationFailed {
                path: self.slot.path.clone(),
                cause,
            };
            return Err(self.roll_back(prior.as_ref(), error, &mut enter));
        }

        enter(InstallPhase::Committed);
        Ok(InstallReport {
            path: self.slot.path.clone(),
            backup_path: prior.map(|_| self.slot.backup_path.clone()),
            sha256: sha256_hex(artifact.as_bytes()),
            size: artifact.len() as u64,
        })
    }

    /// Put the backup back into the slot, after checking it loads.
    pub fn restore(&mut self) -> Result<RestoreReport, InstallError> {
        let cancel = self.cancel.clone();
        let _lock = hold_cancel(cancel.as_ref())?;
        let backup_path = self.slot.backup_path.clone();
        let bytes = std::fs::read(&backup_path).map_err(|err| {
            restore_failed(&backup_path, None, format!("cannot read backup: {err}"))
        })?;
        let sha256 = sha256_hex(&bytes);
        if let Err(err) = self.backend.decode(&bytes) {
            return Err(restore_failed(
                &backup_path,
                Some(sha256),
                format!("backup does not load: {err}"),
            ));
        }
        write_atomic(&self.slot.path, &bytes).map_err(|err| {
            restore_failed(
                &backup_path,
                Some(sha256.clone()),
                format!("cannot write {}: {err}", self.slot.path.display()),
            )
        })?;
        tracing::info!(
            "Restored {} from {}",
            self.slot.path.display(),
            backup_path.display()
        );
        Ok(RestoreReport {
            path: self.slot.path.clone(),
            sha256,
        })
    }

    fn back_up(&self) -> Result<Option<PriorModel>, InstallError> {
        let backup_failed = |source| InstallError::BackupFailed {
            path: self.slot.path.clone(),
            backup_path: self.slot.backup_path.clone(),
            source,
        };
        if let Some(parent) = self.slot.path.parent() {
            std::fs::create_dir_all(parent).map_err(backup_failed)?;
        }
        let bytes = match std::fs::read(&self.slot.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No model installed at {}; nothing to back up", self.slot.path.display());
                return Ok(None);
            }
            Err(err) => return Err(backup_failed(err)),
        };
        write_atomic(&self.slot.backup_path, &bytes).map_err(backup_failed)?;
        Ok(Some(PriorModel {
            sha256: sha256_hex(&bytes),
        }))
    }

    /// Return the slot to its pre-install contents and hand back `error`, or
    /// a `RestoreFailed` if that is impossible.
    fn roll_back(
        &self,
        prior: Option<&PriorModel>,
        error: InstallError,
        enter: &mut impl FnMut(InstallPhase),
    ) -> InstallError {
        tracing::warn!("Rolling back model install: {error}");
        match self.put_back(prior) {
            Ok(()) => {
                enter(InstallPhase::Failed(FailureKind::RolledBack));
                error
            }
            Err(restore_error) => {
                enter(InstallPhase::Failed(FailureKind::Indeterminate));
                restore_error
            }
        }
    }

    fn put_back(&self, prior: Option<&PriorModel>) -> Result<(), InstallError> {
        let backup_path = &self.slot.backup_path;
        let Some(prior) = prior else {
            // The slot was empty before this run.
            return match std::fs::remove_file(&self.slot.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(restore_failed(
                    backup_path,
                    None,
                    format!("cannot remove new model {}: {err}", self.slot.path.display()),
                )),
            };
        };
        let expected = Some(prior.sha256.clone());
        let bytes = std::fs::read(backup_path).map_err(|err| {
            restore_failed(backup_path, expected.clone(), format!("cannot read backup: {err}"))
        })?;
        if sha256_hex(&bytes) != prior.sha256 {
            return Err(restore_failed(
                backup_path,
                expected,
                "backup changed since it was written".to_string(),
            ));
        }
        write_atomic(&self.slot.path, &bytes).map_err(|err| {
            restore_failed(
                backup_path,
                expected,
                format!("cannot write {}: {err}", self.slot.path.display()),
            )
        })
    }
}

fn restore_failed(backup_path: &Path, expected_sha256: Option<String>, reason: String) -> InstallError {
    tracing::error!(
        backup = %backup_path.display(),
        expected_sha256 = expected_sha256.as_deref().unwrap_or("unknown"),
        "Model slot could not be restored: {reason}"
    );
    InstallError::RestoreFailed {
        backup_path: backup_path.to_path_buf(),
        expected_sha256,
        reason,
    }
}

/// Lock `cancel` for the duration of an install or restore.
fn hold_cancel(cancel: Option<&CancelToken>) -> Result<Option<CancelLock<'_>>, InstallError> {
    cancel
        .map(|token| token.try_lock().ok_or(InstallError::Cancelled))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ModelFit, NaiveBayesBackend};
    use crate::corpus::Sentiment;
    use tempfile::tempdir;

    fn artifact(backend: &NaiveBayesBackend, positive: &str) -> ModelArtifact {
        let mut fit = backend.start_fit();
        fit.observe(positive, Sentiment::Positive).unwrap();
        fit.observe("差", Sentiment::Negative).unwrap();
        fit.finish().unwrap()
    }

    #[test]
    fn install_into_empty_slot_commits_without_backup() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("models").join("m.model"));
        let model = artifact(&backend, "好");
        let mut phases = Vec::new();

        let report = ModelInstaller::new(&mut slot, &backend)
            .install(&model, |phase| phases.push(phase))
            .unwrap();

        assert_eq!(
            phases,
            vec![
                InstallPhase::BackingUp,
                InstallPhase::Replacing,
                InstallPhase::Verifying,
                InstallPhase::Committed
            ]
        );
        assert_eq!(report.backup_path, None);
        assert_eq!(std::fs::read(slot.path()).unwrap(), model.as_bytes());
        assert!(!slot.backup_path().exists());
    }

    #[test]
    fn second_install_overwrites_the_single_backup() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let first = artifact(&backend, "好");
        let second = artifact(&backend, "棒");
        let third = artifact(&backend, "赞");
        for model in [&first, &second, &third] {
            ModelInstaller::new(&mut slot, &backend)
                .install(model, |_| {})
                .unwrap();
        }
        assert_eq!(std::fs::read(slot.backup_path()).unwrap(), second.as_bytes());
        assert_eq!(std::fs::read(slot.path()).unwrap(), third.as_bytes());
    }

    #[test]
    fn unloadable_artifact_into_empty_slot_leaves_it_empty() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let mut phases = Vec::new();

        let err = ModelInstaller::new(&mut slot, &backend)
            .install(&ModelArtifact::new(b"junk".to_vec()), |phase| phases.push(phase))
            .unwrap_err();

        assert!(matches!(err, InstallError::InstallVerificationFailed { .. }));
        assert_eq!(
            phases.last(),
            Some(&InstallPhase::Failed(FailureKind::RolledBack))
        );
        assert!(!slot.path().exists());
    }

    #[test]
    fn cancel_requests_are_refused_mid_install() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let mut refused = Vec::new();

        ModelInstaller::new(&mut slot, &backend)
            .with_cancel(cancel.clone())
            .install(&artifact(&backend, "好"), |phase| {
                if phase != InstallPhase::Committed {
                    refused.push(!remote.request_cancel());
                }
            })
            .unwrap();

        assert_eq!(refused, vec![true, true, true]);
        assert!(!cancel.is_cancelled());
        assert!(cancel.request_cancel());
    }

    #[test]
    fn pending_cancel_prevents_the_install() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let cancel = CancelToken::new();
        cancel.request_cancel();
        let err = ModelInstaller::new(&mut slot, &backend)
            .with_cancel(cancel)
            .install(&artifact(&backend, "好"), |_| {})
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
        assert!(!slot.path().exists());
    }

    #[test]
    fn pending_cancel_prevents_a_restore() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        for model in [artifact(&backend, "好"), artifact(&backend, "棒")] {
            ModelInstaller::new(&mut slot, &backend)
                .install(&model, |_| {})
                .unwrap();
        }
        let before = std::fs::read(slot.path()).unwrap();
        let cancel = CancelToken::new();
        assert!(cancel.request_cancel());

        let err = ModelInstaller::new(&mut slot, &backend)
            .with_cancel(cancel)
            .restore()
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled));
        assert_eq!(std::fs::read(slot.path()).unwrap(), before);
    }

    #[test]
    fn restore_puts_the_backup_back() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let first = artifact(&backend, "好");
        let second = artifact(&backend, "棒");
        for model in [&first, &second] {
            ModelInstaller::new(&mut slot, &backend)
                .install(model, |_| {})
                .unwrap();
        }

        let report = ModelInstaller::new(&mut slot, &backend).restore().unwrap();

        assert_eq!(std::fs::read(slot.path()).unwrap(), first.as_bytes());
        assert_eq!(report.sha256, sha256_hex(first.as_bytes()));
    }

    #[test]
    fn restore_without_backup_fails() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let err = ModelInstaller::new(&mut slot, &backend).restore().unwrap_err();
        assert!(matches!(
            err,
            InstallError::RestoreFailed {
                expected_sha256: None,
                ..
            }
        ));
    }

    #[test]
    fn restore_rejects_a_corrupt_backup() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        let model = artifact(&backend, "好");
        std::fs::write(slot.path(), model.as_bytes()).unwrap();
        std::fs::write(slot.backup_path(), b"corrupt").unwrap();

        let err = ModelInstaller::new(&mut slot, &backend).restore().unwrap_err();

        assert!(matches!(err, InstallError::RestoreFailed { .. }));
        assert_eq!(std::fs::read(slot.path()).unwrap(), model.as_bytes());
    }

    #[test]
    fn tampered_backup_during_rollback_is_restore_failed() {
        let dir = tempdir().unwrap();
        let backend = NaiveBayesBackend::new();
        let mut slot = ModelSlot::new(dir.path().join("m.model"));
        std::fs::write(slot.path(), artifact(&backend, "好").as_bytes()).unwrap();
        let backup = slot.backup_path().to_path_buf();
        let mut phases = Vec::new();

        let err = ModelInstaller::new(&mut slot, &backend)
            .install_with_writer(
                &artifact(&backend, "棒"),
                |phase| phases.push(phase),
                |_, _| {
                    std::fs::write(&backup, b"tampered")?;
                    Err(io::Error::other("disk full"))
                },
            )
            .unwrap_err();

        assert!(matches!(err, InstallError::RestoreFailed { expected_sha256: Some(_), .. }));
        assert_eq!(
            phases.last(),
            Some(&InstallPhase::Failed(FailureKind::Indeterminate))
        );
    }
}
