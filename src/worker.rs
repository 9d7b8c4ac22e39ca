//! Runs the retraining pipeline on a background thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::classifier::ClassifierBackend;
use crate::config::Settings;
use crate::install::{InstallPhase, ModelSlot};
use crate::pipeline::{PipelineError, PipelineEvent, TrainPipeline, TrainReport, TrainRequest};
use crate::registry::ModelRegistry;
use crate::training::TrainingProgress;

/// Everything a background training run needs, moved onto the worker.
pub struct TrainingJob<B> {
    pub settings: Settings,
    pub backend: B,
    pub slot: ModelSlot,
    pub request: TrainRequest,
    pub registry: Option<ModelRegistry>,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub enum JobMessage {
    Progress(TrainingProgress),
    Phase(InstallPhase),
    Finished(Result<TrainReport, PipelineError>),
}

/// Controller side of a running job.
pub struct JobHandle {
    receiver: Receiver<JobMessage>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Ask the job to stop. Refused (`false`) while the model is being installed.
    pub fn cancel(&self) -> bool {
        self.cancel.request_cancel()
    }

    pub fn try_recv(&self) -> Option<JobMessage> {
        self.receiver.try_recv().ok()
    }

    /// Block until the job finishes, handing intermediate messages to
    /// `on_message`.
    pub fn wait(mut self, mut on_message: impl FnMut(&JobMessage)) -> Result<TrainReport, PipelineError> {
        let mut outcome = None;
        for message in self.receiver.iter() {
            match message {
                JobMessage::Finished(result) => {
                    outcome = Some(result);
                    break;
                }
                other => on_message(&other),
            }
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Training worker panicked");
        }
        outcome.unwrap_or(Err(PipelineError::WorkerExited))
    }
}

/// Start `job` on its own thread.
pub fn spawn_training_job<B>(job: TrainingJob<B>) -> JobHandle
where
    B: ClassifierBackend + Send + 'static,
{
    let (tx, receiver) = mpsc::channel();
    let cancel = job.cancel.clone();
    let thread = thread::spawn(move || run_job(job, tx));
    JobHandle {
        receiver,
        cancel,
        thread: Some(thread),
    }
}

fn run_job<B: ClassifierBackend>(job: TrainingJob<B>, tx: Sender<JobMessage>) {
    let TrainingJob {
        settings,
        backend,
        mut slot,
        request,
        registry,
        cancel,
    } = job;
    let mut pipeline = TrainPipeline::new(&settings, &backend).with_cancel(cancel);
    if let Some(registry) = registry.as_ref() {
        pipeline = pipeline.with_registry(registry);
    }
    let result = pipeline.run(&mut slot, &request, |event| {
        let message = match event {
            PipelineEvent::Training(progress) => JobMessage::Progress(progress),
            PipelineEvent::Install(phase) => JobMessage::Phase(phase),
        };
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(message);
    });
    if let Err(err) = &result {
        tracing::warn!("Training job failed: {err}");
    }
    let _ = tx.send(JobMessage::Finished(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NaiveBayesBackend;
    use crate::training::TrainingError;
    use std::path::Path;
    use tempfile::tempdir;

    fn job(dir: &Path, cancel: CancelToken) -> TrainingJob<NaiveBayesBackend> {
        let csv = dir.join("train.csv");
        let mut data = String::from("text,label\n");
        for idx in 0..30 {
            data.push_str(&format!("happy {idx},1\nsad {idx},0\n"));
        }
        std::fs::write(&csv, data).unwrap();
        TrainingJob {
            settings: Settings::default(),
            backend: NaiveBayesBackend::new(),
            slot: ModelSlot::new(dir.join("sentiment.model")),
            request: TrainRequest {
                files: vec![csv],
                ..TrainRequest::default()
            },
            registry: None,
            cancel,
        }
    }

    #[test]
    fn streams_progress_and_phases_then_finishes() {
        let dir = tempdir().unwrap();
        let handle = spawn_training_job(job(dir.path(), CancelToken::new()));
        let mut progress = Vec::new();
        let mut phases = Vec::new();

        let report = handle
            .wait(|message| match message {
                JobMessage::Progress(update) => progress.push(update.examples_processed),
                JobMessage::Phase(phase) => phases.push(*phase),
                JobMessage::Finished(_) => unreachable!(),
            })
            .unwrap();

        assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(progress.last(), Some(&report.trained_on));
        assert_eq!(
            phases,
            vec![
                InstallPhase::BackingUp,
                InstallPhase::Replacing,
                InstallPhase::Verifying,
                InstallPhase::Committed
            ]
        );
        assert!(dir.path().join("sentiment.model").exists());
    }

    #[test]
    fn pre_cancelled_job_leaves_no_model() {
        let dir = tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.request_cancel();

        let err = spawn_training_job(job(dir.path(), cancel)).wait(|_| {}).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Training(TrainingError::Cancelled { examples_processed: 0 })
        ));
        assert!(!dir.path().join("sentiment.model").exists());
    }
}
