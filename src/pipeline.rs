//! End-to-end retraining: ingest, train, install, score, record.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::classifier::{BackendError, ClassifierBackend, SentimentModel};
use crate::config::{ConfigError, Settings};
use crate::corpus::{CorpusError, RedistributionSummary, TrainingCorpus, holdout_split};
use crate::evaluate::{EvaluationError, Evaluator, NeutralScoring, Thresholds};
use crate::ingest::{
    IngestError, Ingestor, LabelVocabulary, LabeledDataset, SourceSummary, VocabularyError,
};
use crate::install::{InstallError, InstallPhase, InstallReport, ModelInstaller, ModelSlot};
use crate::registry::{ModelRecord, ModelRegistry, NewModel, RegistryError};
use crate::training::{TrainingError, TrainingProgress, TrainingSession};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No input files given")]
    NoInputFiles,
    #[error("Training worker exited without a result")]
    WorkerExited,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Observable steps of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Training(TrainingProgress),
    Install(InstallPhase),
}

/// What to train on and how to label the result in history.
#[derive(Debug, Clone, Default)]
pub struct TrainRequest {
    pub files: Vec<PathBuf>,
    /// Labeled files scored before and after the install. When empty, rows
    /// are only held out if `holdout_fraction` is set.
    pub holdout_files: Vec<PathBuf>,
    /// History name; defaults to the first file's stem.
    pub name: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub sources: Vec<SourceSummary>,
    pub skipped_row_count: usize,
    pub invalid_label_count: usize,
    pub redistribution: RedistributionSummary,
    pub trained_on: usize,
    pub held_out: usize,
    /// Accuracy of the previously installed model on the held-out rows.
    pub baseline_accuracy: Option<f64>,
    /// Accuracy of the new model on the held-out rows.
    pub holdout_accuracy: Option<f64>,
    pub install: InstallReport,
    pub history: Option<ModelRecord>,
}

/// Build the ingestor described by `settings`.
pub fn ingestor(settings: &Settings) -> Result<Ingestor, PipelineError> {
    let vocabulary = LabelVocabulary::with_extra(&settings.labels)?;
    Ok(Ingestor::new(settings.ingest.clone(), vocabulary))
}

/// Load and merge `files` with the configured ingestion settings.
pub fn load_dataset<P: AsRef<Path>>(settings: &Settings, files: &[P]) -> Result<LabeledDataset, PipelineError> {
    if files.is_empty() {
        return Err(PipelineError::NoInputFiles);
    }
    Ok(ingestor(settings)?.load_many(files)?)
}

/// Scoring mode for `settings`: binary with the training strategy, or
/// three-way with the configured thresholds.
pub fn scoring_mode(settings: &Settings, three_way: bool) -> Result<NeutralScoring, PipelineError> {
    if three_way {
        let thresholds = Thresholds::new(
            settings.evaluation.negative_threshold,
            settings.evaluation.positive_threshold,
        )?;
        Ok(NeutralScoring::SeparateBucket(thresholds))
    } else {
        Ok(NeutralScoring::Redistribute(settings.training.neutral_strategy()))
    }
}

/// Retrains a model from CSV files and installs it into a slot.
pub struct TrainPipeline<'a, B: ClassifierBackend> {
    settings: &'a Settings,
    backend: &'a B,
    registry: Option<&'a ModelRegistry>,
    cancel: Option<CancelToken>,
}

impl<'a, B: ClassifierBackend> TrainPipeline<'a, B> {
    pub fn new(settings: &'a Settings, backend: &'a B) -> Self {
        Self {
            settings,
            backend,
            registry: None,
            cancel: None,
        }
    }

    /// Snapshot installed models into `registry`.
    pub fn with_registry(mut self, registry: &'a ModelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(
        &self,
        slot: &mut ModelSlot,
        request: &TrainRequest,
        mut on_event: impl FnMut(PipelineEvent),
    ) -> Result<TrainReport, PipelineError> {
        let dataset = load_dataset(self.settings, &request.files)?;
        let skipped_row_count = dataset.skipped_row_count;
        let invalid_label_count = dataset.invalid_label_count();
        let sources = dataset.sources.clone();

        let training = &self.settings.training;
        let (train_examples, holdout) = if !request.holdout_files.is_empty() {
            let holdout = load_dataset(self.settings, &request.holdout_files)?;
            (dataset.examples, holdout)
        } else if training.holdout_fraction > 0.0 {
            let split = holdout_split(dataset.examples, training.holdout_fraction, training.seed);
            (split.train, LabeledDataset::from_examples(split.holdout))
        } else {
            (dataset.examples, LabeledDataset::default())
        };
        tracing::info!(
            "Training on {} examples, {} held out",
            train_examples.len(),
            holdout.len()
        );

        let baseline_accuracy = match self.backend.load(slot.path()) {
            Ok(previous) => self.holdout_accuracy(&previous, &holdout, self.cancel.as_ref())?,
            Err(err) => {
                tracing::info!("No baseline model: {err}");
                None
            }
        };

        let strategy = training.neutral_strategy();
        let corpus = TrainingCorpus::from_labeled(&train_examples, &strategy)?;
        let redistribution = corpus.redistribution();
        let trained_on = corpus.len();

        let mut session =
            TrainingSession::new(self.backend).with_progress_stride(training.progress_stride);
        if let Some(cancel) = &self.cancel {
            session = session.with_cancel(cancel.clone());
        }
        let mut on_progress = |progress: TrainingProgress| on_event(PipelineEvent::Training(progress));
        let artifact = session.run_with_progress(corpus, Some(&mut on_progress))?;

        let mut installer = ModelInstaller::new(slot, self.backend);
        if let Some(cancel) = &self.cancel {
            installer = installer.with_cancel(cancel.clone());
        }
        let install = installer.install(&artifact, |phase| on_event(PipelineEvent::Install(phase)))?;

        // The slot is committed; scoring it is no longer cancellable.
        let model = self.backend.decode(artifact.as_bytes())?;
        let holdout_accuracy = self.holdout_accuracy(&model, &holdout, None)?;
        if let (Some(before), Some(after)) = (baseline_accuracy, holdout_accuracy) {
            tracing::info!(
                "Held-out accuracy {:.2}% -> {:.2}%",
                before * 100.0,
                after * 100.0
            );
        }

        let history = match self.registry {
            Some(registry) => Some(registry.record(
                &artifact,
                NewModel {
                    name: history_name(request),
                    train_files: request.files.clone(),
                    train_samples: trained_on,
                    holdout_accuracy,
                    neutral_strategy: strategy.kind(),
                    notes: request.notes.clone(),
                },
            )?),
            None => None,
        };

        Ok(TrainReport {
            sources,
            skipped_row_count,
            invalid_label_count,
            redistribution,
            trained_on,
            held_out: holdout.len(),
            baseline_accuracy,
            holdout_accuracy,
            install,
            history,
        })
    }

    /// Binary accuracy on `holdout`, or `None` when there is nothing to score.
    fn holdout_accuracy<M: SentimentModel>(
        &self,
        model: &M,
        holdout: &LabeledDataset,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<f64>, PipelineError> {
        if holdout.is_empty() {
            return Ok(None);
        }
        let mode = NeutralScoring::Redistribute(self.settings.training.neutral_strategy());
        let mut evaluator = Evaluator::new(model, mode);
        if let Some(cancel) = cancel {
            evaluator = evaluator.with_cancel(cancel.clone());
        }
        match evaluator.evaluate(holdout) {
            Ok(report) => Ok(Some(report.accuracy)),
            Err(EvaluationError::NothingToEvaluate { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Install a model from history into `slot`.
pub fn activate<B, F>(
    registry: &ModelRegistry,
    id: &str,
    slot: &mut ModelSlot,
    backend: &B,
    on_phase: F,
) -> Result<(ModelRecord, InstallReport), PipelineError>
where
    B: ClassifierBackend,
    F: FnMut(InstallPhase),
{
    let (record, artifact) = registry.load_artifact(id)?;
    let install = ModelInstaller::new(slot, backend).install(&artifact, on_phase)?;
    tracing::info!("Activated model {} ({})", record.id, record.name);
    Ok((record, install))
}

fn history_name(request: &TrainRequest) -> String {
    if let Some(name) = request.name.as_deref().filter(|name| !name.trim().is_empty()) {
        return name.trim().to_string();
    }
    request
        .files
        .first()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}
