//! Binary training corpus built from labeled examples.

mod redistribute;
mod split;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use redistribute::{NeutralStrategy, RedistributionSummary, StrategyKind, redistribute};
pub use split::{HoldoutSplit, holdout_split};

use crate::ingest::LabeledExample;

/// One of the two classes the classifier trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Positive,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Positive => "positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExample {
    pub content: String,
    pub sentiment: Sentiment,
}

impl BinaryExample {
    pub fn new(content: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            content: content.into(),
            sentiment,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusError {
    /// The corpus would be empty or hold a single class.
    #[error("Training corpus needs both classes (positive: {positive}, negative: {negative})")]
    EmptyCorpus { positive: usize, negative: usize },
}

/// Binary examples ready for training. Never empty; always holds both classes.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    examples: Vec<BinaryExample>,
    positive: usize,
    negative: usize,
    redistribution: RedistributionSummary,
}

impl TrainingCorpus {
    /// Resolve neutral labels with `strategy` and validate the result.
    pub fn from_labeled(
        examples: &[LabeledExample],
        strategy: &NeutralStrategy,
    ) -> Result<Self, CorpusError> {
        let (binary, summary) = redistribute(examples, strategy);
        let mut corpus = Self::from_examples(binary)?;
        corpus.redistribution = summary;
        tracing::info!(
            "Corpus ready with {strategy}: {} positive, {} negative ({} neutral relabeled, {} neutral dropped, {} invalid dropped)",
            corpus.positive,
            corpus.negative,
            summary.neutral_to_positive + summary.neutral_to_negative,
            summary.neutral_dropped,
            summary.invalid_dropped,
        );
        Ok(corpus)
    }

    pub fn from_examples(examples: Vec<BinaryExample>) -> Result<Self, CorpusError> {
        let positive = examples
            .iter()
            .filter(|example| example.sentiment == Sentiment::Positive)
            .count();
        let negative = examples.len() - positive;
        if positive == 0 || negative == 0 {
            return Err(CorpusError::EmptyCorpus { positive, negative });
        }
        Ok(Self {
            examples,
            positive,
            negative,
            redistribution: RedistributionSummary::default(),
        })
    }

    pub fn examples(&self) -> &[BinaryExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Never true for a constructed corpus.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn positive_count(&self) -> usize {
        self.positive
    }

    pub fn negative_count(&self) -> usize {
        self.negative
    }

    pub fn redistribution(&self) -> RedistributionSummary {
        self.redistribution
    }

    pub fn into_examples(self) -> Vec<BinaryExample> {
        self.examples
    }
}

impl IntoIterator for TrainingCorpus {
    type Item = BinaryExample;
    type IntoIter = std::vec::IntoIter<BinaryExample>;

    fn into_iter(self) -> Self::IntoIter {
        self.examples.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LabelClass;

    #[test]
    fn single_class_corpus_is_rejected() {
        let input = vec![
            LabeledExample::new("a", LabelClass::Positive),
            LabeledExample::new("b", LabelClass::Neutral),
        ];
        let err = TrainingCorpus::from_labeled(&input, &NeutralStrategy::Exclude).unwrap_err();
        assert_eq!(
            err,
            CorpusError::EmptyCorpus {
                positive: 1,
                negative: 0
            }
        );
        assert!(TrainingCorpus::from_labeled(&input, &NeutralStrategy::ForceNegative).is_ok());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            TrainingCorpus::from_labeled(&[], &NeutralStrategy::AutoBalance),
            Err(CorpusError::EmptyCorpus { .. })
        ));
    }

    #[test]
    fn corpus_records_redistribution() {
        let input = vec![
            LabeledExample::new("a", LabelClass::Positive),
            LabeledExample::new("b", LabelClass::Negative),
            LabeledExample::new("c", LabelClass::Neutral),
            LabeledExample::new("d", LabelClass::Invalid),
        ];
        let corpus = TrainingCorpus::from_labeled(&input, &NeutralStrategy::ForcePositive).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.positive_count(), 2);
        assert_eq!(corpus.redistribution().invalid_dropped, 1);
    }
}
