//! Scores a model against labeled data.

pub mod metrics;
mod smoke;

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::classifier::SentimentModel;
use crate::corpus::{NeutralStrategy, Sentiment, redistribute};
use crate::ingest::{LabelClass, LabeledDataset};
use metrics::{ConfusionMatrix, PerClassStats, accuracy, precision_recall_by_class};

pub use smoke::{SMOKE_SENTENCES, SmokeResult, smoke_test};

/// Probability above which the binary decision is Positive.
pub const BINARY_CUT: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("Invalid thresholds: need 0 <= negative ({negative_below}) <= positive ({positive_above}) <= 1")]
    InvalidThresholds {
        negative_below: f64,
        positive_above: f64,
    },
    #[error("No scorable examples ({skipped} rows skipped, {invalid} invalid labels)")]
    NothingToEvaluate { skipped: usize, invalid: usize },
    #[error("Evaluation cancelled after {scored} examples")]
    Cancelled { scored: usize },
}

/// Two cut points binning the positive probability into three classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    negative_below: f64,
    positive_above: f64,
}

impl Thresholds {
    pub fn new(negative_below: f64, positive_above: f64) -> Result<Self, EvaluationError> {
        let valid = (0.0..=1.0).contains(&negative_below)
            && (0.0..=1.0).contains(&positive_above)
            && negative_below <= positive_above;
        if !valid {
            return Err(EvaluationError::InvalidThresholds {
                negative_below,
                positive_above,
            });
        }
        Ok(Self {
            negative_below,
            positive_above,
        })
    }

    pub fn negative_below(&self) -> f64 {
        self.negative_below
    }

    pub fn positive_above(&self) -> f64 {
        self.positive_above
    }

    pub fn classify(&self, probability: f64) -> LabelClass {
        if probability < self.negative_below {
            LabelClass::Negative
        } else if probability > self.positive_above {
            LabelClass::Positive
        } else {
            LabelClass::Neutral
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            negative_below: 0.4,
            positive_above: 0.6,
        }
    }
}

/// How neutral ground truth is scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeutralScoring {
    /// Resolve neutral truth like training data; binary decision at 0.5.
    Redistribute(NeutralStrategy),
    /// Keep neutral as a third class and bin the probability.
    SeparateBucket(Thresholds),
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Class names in confusion-matrix order.
    pub classes: Vec<&'static str>,
    pub accuracy: f64,
    pub per_class: BTreeMap<&'static str, PerClassStats>,
    pub confusion: ConfusionMatrix,
    pub evaluated: usize,
    pub skipped_row_count: usize,
    pub invalid_label_count: usize,
    /// Neutral examples not scored because the strategy drops them.
    pub neutral_dropped: usize,
}

/// Scores an explicitly supplied model.
pub struct Evaluator<'a, M: SentimentModel + ?Sized> {
    model: &'a M,
    mode: NeutralScoring,
    cancel: Option<CancelToken>,
}

impl<'a, M: SentimentModel + ?Sized> Evaluator<'a, M> {
    pub fn new(model: &'a M, mode: NeutralScoring) -> Self {
        Self {
            model,
            mode,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn evaluate(&self, dataset: &LabeledDataset) -> Result<EvaluationReport, EvaluationError> {
        let invalid_label_count = dataset.invalid_label_count();
        let (classes, truths, neutral_dropped) = self.ground_truth(dataset);
        if truths.is_empty() {
            return Err(EvaluationError::NothingToEvaluate {
                skipped: dataset.skipped_row_count,
                invalid: invalid_label_count,
            });
        }

        let mut confusion = ConfusionMatrix::new(classes.len());
        for (scored, (content, truth)) in truths.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(EvaluationError::Cancelled { scored });
            }
            let probability = self.model.positive_probability(content);
            confusion.add(*truth, self.predict(probability));
        }

        let stats = precision_recall_by_class(&confusion);
        let report = EvaluationReport {
            accuracy: accuracy(&confusion),
            per_class: classes.iter().copied().zip(stats).collect(),
            classes,
            confusion,
            evaluated: truths.len(),
            skipped_row_count: dataset.skipped_row_count,
            invalid_label_count,
            neutral_dropped,
        };
        tracing::info!(
            "Evaluated {} examples: accuracy {:.2}%",
            report.evaluated,
            report.accuracy * 100.0
        );
        Ok(report)
    }

    /// Class names, `(content, truth index)` pairs and dropped neutral count.
    #[allow(clippy::type_complexity)]
    fn ground_truth<'d>(
        &self,
        dataset: &'d LabeledDataset,
    ) -> (Vec<&'static str>, Vec<(Cow<'d, str>, usize)>, usize) {
        match self.mode {
            NeutralScoring::Redistribute(strategy) => {
                let (binary, summary) = redistribute(&dataset.examples, &strategy);
                let truths = binary
                    .into_iter()
                    .map(|example| {
                        let idx = match example.sentiment {
                            Sentiment::Negative => 0,
                            Sentiment::Positive => 1,
                        };
                        (Cow::Owned(example.content), idx)
                    })
                    .collect();
                (vec!["negative", "positive"], truths, summary.neutral_dropped)
            }
            NeutralScoring::SeparateBucket(_) => {
                let truths = dataset
                    .examples
                    .iter()
                    .filter_map(|example| {
                        three_way_index(example.class)
                            .map(|idx| (Cow::Borrowed(example.content.as_str()), idx))
                    })
                    .collect();
                (vec!["negative", "neutral", "positive"], truths, 0)
            }
        }
    }

    fn predict(&self, probability: f64) -> usize {
        match self.mode {
            NeutralScoring::Redistribute(_) => usize::from(probability > BINARY_CUT),
            NeutralScoring::SeparateBucket(thresholds) => {
                three_way_index(thresholds.classify(probability)).unwrap_or(1)
            }
        }
    }
}

fn three_way_index(class: LabelClass) -> Option<usize> {
    match class {
        LabelClass::Negative => Some(0),
        LabelClass::Neutral => Some(1),
        LabelClass::Positive => Some(2),
        LabelClass::Invalid => None,
    }
}
