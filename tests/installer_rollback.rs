use std::io;

use sentrain::classifier::{ClassifierBackend, ModelArtifact, ModelFit, NaiveBayesBackend};
use sentrain::corpus::Sentiment;
use sentrain::install::{FailureKind, InstallError, InstallPhase, ModelInstaller, ModelSlot};
use tempfile::tempdir;

fn trained(backend: &NaiveBayesBackend, positive: &str, negative: &str) -> ModelArtifact {
    let mut fit = backend.start_fit();
    fit.observe(positive, Sentiment::Positive).unwrap();
    fit.observe(negative, Sentiment::Negative).unwrap();
    fit.finish().unwrap()
}

#[test]
fn failed_write_leaves_slot_byte_identical() {
    let dir = tempdir().unwrap();
    let backend = NaiveBayesBackend::new();
    let mut slot = ModelSlot::new(dir.path().join("sentiment.model"));
    let old = trained(&backend, "好", "差");
    ModelInstaller::new(&mut slot, &backend).install(&old, |_| {}).unwrap();
    let before = std::fs::read(slot.path()).unwrap();
    let mut phases = Vec::new();

    let err = ModelInstaller::new(&mut slot, &backend)
        .install_with_writer(
            &trained(&backend, "great", "awful"),
            |phase| phases.push(phase),
            |path, bytes| {
                // Leave a torn file behind before failing.
                std::fs::write(path, &bytes[..bytes.len() / 2])?;
                Err(io::Error::other("disk full"))
            },
        )
        .unwrap_err();

    assert!(matches!(err, InstallError::ReplaceFailed { .. }), "{err}");
    assert_eq!(std::fs::read(slot.path()).unwrap(), before);
    assert_eq!(std::fs::read(slot.backup_path()).unwrap(), before);
    assert_eq!(
        phases.last(),
        Some(&InstallPhase::Failed(FailureKind::RolledBack))
    );
}

#[test]
fn unloadable_model_is_rolled_back_after_verification() {
    let dir = tempdir().unwrap();
    let backend = NaiveBayesBackend::new();
    let mut slot = ModelSlot::new(dir.path().join("sentiment.model"));
    let old = trained(&backend, "好", "差");
    ModelInstaller::new(&mut slot, &backend).install(&old, |_| {}).unwrap();
    let before = std::fs::read(slot.path()).unwrap();
    let mut phases = Vec::new();

    let err = ModelInstaller::new(&mut slot, &backend)
        .install(&ModelArtifact::new(b"not a model".to_vec()), |phase| {
            phases.push(phase)
        })
        .unwrap_err();

    assert!(matches!(err, InstallError::InstallVerificationFailed { .. }), "{err}");
    assert_eq!(std::fs::read(slot.path()).unwrap(), before);
    assert_eq!(
        phases,
        vec![
            InstallPhase::BackingUp,
            InstallPhase::Replacing,
            InstallPhase::Verifying,
            InstallPhase::Failed(FailureKind::RolledBack),
        ]
    );
}
