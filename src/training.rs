//! Drives a backend fit over a training corpus.

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::classifier::{BackendError, ClassifierBackend, ModelArtifact, ModelFit};
use crate::corpus::TrainingCorpus;

/// Progress of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    pub examples_processed: usize,
    pub total_examples: usize,
}

impl TrainingProgress {
    pub fn fraction(&self) -> f32 {
        if self.total_examples == 0 {
            return 1.0;
        }
        self.examples_processed as f32 / self.total_examples as f32
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    /// The backend rejected an example or could not produce an artifact.
    #[error("Training failed: {cause}")]
    TrainingFailed {
        #[source]
        cause: BackendError,
    },
    #[error("Training cancelled after {examples_processed} examples")]
    Cancelled { examples_processed: usize },
}

/// One training run against a backend.
pub struct TrainingSession<'a, B: ClassifierBackend> {
    backend: &'a B,
    progress_stride: usize,
    cancel: Option<CancelToken>,
}

impl<'a, B: ClassifierBackend> TrainingSession<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            progress_stride: 100,
            cancel: None,
        }
    }

    /// Report progress every `stride` examples (and once at the end).
    pub fn with_progress_stride(mut self, stride: usize) -> Self {
        self.progress_stride = stride.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(&self, corpus: TrainingCorpus) -> Result<ModelArtifact, TrainingError> {
        self.run_with_progress(corpus, None)
    }

    /// Fit every example in order. The corpus is consumed; a failed or
    /// cancelled run produces no artifact.
    pub fn run_with_progress(
        &self,
        corpus: TrainingCorpus,
        mut on_progress: Option<&mut dyn FnMut(TrainingProgress)>,
    ) -> Result<ModelArtifact, TrainingError> {
        let total_examples = corpus.len();
        tracing::info!(
            "Training {} on {total_examples} examples ({} positive, {} negative)",
            self.backend.name(),
            corpus.positive_count(),
            corpus.negative_count(),
        );
        let mut fit = self.backend.start_fit();
        let mut examples_processed = 0;
        for example in corpus {
            self.check_cancel(examples_processed)?;
            fit.observe(&example.content, example.sentiment)
                .map_err(|cause| TrainingError::TrainingFailed { cause })?;
            examples_processed += 1;
            let at_stride = examples_processed % self.progress_stride == 0;
            if at_stride || examples_processed == total_examples {
                self.check_cancel(examples_processed)?;
                if let Some(callback) = on_progress.as_mut() {
                    callback(TrainingProgress {
                        examples_processed,
                        total_examples,
                    });
                }
            }
        }
        let artifact = fit
            .finish()
            .map_err(|cause| TrainingError::TrainingFailed { cause })?;
        tracing::info!("Training produced a {} byte model", artifact.len());
        Ok(artifact)
    }

    fn check_cancel(&self, examples_processed: usize) -> Result<(), TrainingError> {
        match &self.cancel {
            Some(cancel) if cancel.is_cancelled() => {
                tracing::info!("Training cancelled after {examples_processed} examples");
                Err(TrainingError::Cancelled { examples_processed })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NaiveBayesBackend, SentimentModel};
    use crate::corpus::{BinaryExample, Sentiment};

    fn corpus(n: usize) -> TrainingCorpus {
        let examples = (0..n)
            .map(|idx| {
                if idx % 2 == 0 {
                    BinaryExample::new(format!("good {idx}"), Sentiment::Positive)
                } else {
                    BinaryExample::new(format!("bad {idx}"), Sentiment::Negative)
                }
            })
            .collect();
        TrainingCorpus::from_examples(examples).unwrap()
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_total() {
        let backend = NaiveBayesBackend::new();
        let mut seen = Vec::new();
        let mut record = |progress: TrainingProgress| seen.push(progress.examples_processed);
        let artifact = TrainingSession::new(&backend)
            .with_progress_stride(4)
            .run_with_progress(corpus(10), Some(&mut record))
            .unwrap();
        assert_eq!(seen, vec![4, 8, 10]);
        let model = backend.decode(artifact.as_bytes()).unwrap();
        assert!(model.positive_probability("good") > 0.5);
    }

    #[test]
    fn cancel_stops_before_the_next_progress_event() {
        let backend = NaiveBayesBackend::new();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let mut seen = Vec::new();
        let mut record = |progress: TrainingProgress| {
            seen.push(progress.examples_processed);
            remote.request_cancel();
        };
        let err = TrainingSession::new(&backend)
            .with_progress_stride(2)
            .with_cancel(cancel)
            .run_with_progress(corpus(10), Some(&mut record))
            .unwrap_err();
        assert!(matches!(err, TrainingError::Cancelled { examples_processed: 2 }));
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn backend_failure_surfaces_as_training_failed() {
        struct Failing;
        struct FailingFit;
        impl ModelFit for FailingFit {
            fn observe(&mut self, _: &str, _: Sentiment) -> Result<(), BackendError> {
                Err(BackendError::Fit("disk full".to_string()))
            }
            fn finish(self) -> Result<ModelArtifact, BackendError> {
                Ok(ModelArtifact::new(Vec::new()))
            }
        }
        impl ClassifierBackend for Failing {
            type Fit = FailingFit;
            type Model = crate::classifier::NaiveBayesModel;
            fn name(&self) -> &'static str {
                "failing"
            }
            fn start_fit(&self) -> Self::Fit {
                FailingFit
            }
            fn decode(&self, _: &[u8]) -> Result<Self::Model, BackendError> {
                Err(BackendError::Decode("unsupported".to_string()))
            }
        }

        let err = TrainingSession::new(&Failing).run(corpus(4)).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::TrainingFailed {
                cause: BackendError::Fit(_)
            }
        ));
    }
}
