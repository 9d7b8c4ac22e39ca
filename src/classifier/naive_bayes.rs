//! Multinomial naive Bayes over bag-of-token features.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BackendError, ClassifierBackend, ModelArtifact, ModelFit, SentimentModel, tokenize};
use crate::corpus::Sentiment;

const FORMAT_TAG: &str = "sentrain-naive-bayes";
const FORMAT_VERSION: u32 = 1;

const NEG: usize = 0;
const POS: usize = 1;

fn class_index(sentiment: Sentiment) -> usize {
    match sentiment {
        Sentiment::Negative => NEG,
        Sentiment::Positive => POS,
    }
}

/// Backend producing JSON-serialized [`NaiveBayesModel`]s.
#[derive(Debug, Clone)]
pub struct NaiveBayesBackend {
    alpha: f64,
}

impl NaiveBayesBackend {
    pub fn new() -> Self {
        Self { alpha: 1.0 }
    }

    /// Additive smoothing constant. Non-positive values fall back to 1.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = if alpha.is_finite() && alpha > 0.0 { alpha } else { 1.0 };
        self
    }
}

impl Default for NaiveBayesBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBackend for NaiveBayesBackend {
    type Fit = NaiveBayesFit;
    type Model = NaiveBayesModel;

    fn name(&self) -> &'static str {
        "naive-bayes"
    }

    fn start_fit(&self) -> Self::Fit {
        NaiveBayesFit {
            model: NaiveBayesModel::empty(self.alpha),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Self::Model, BackendError> {
        let model: NaiveBayesModel =
            serde_json::from_slice(bytes).map_err(|err| BackendError::Decode(err.to_string()))?;
        model.validate().map_err(BackendError::Decode)?;
        Ok(model)
    }
}

/// Accumulates token counts per class.
#[derive(Debug)]
pub struct NaiveBayesFit {
    model: NaiveBayesModel,
}

impl ModelFit for NaiveBayesFit {
    fn observe(&mut self, text: &str, sentiment: Sentiment) -> Result<(), BackendError> {
        let class = class_index(sentiment);
        self.model.documents[class] += 1;
        for token in tokenize(text) {
            self.model.token_totals[class] += 1;
            self.model.token_counts.entry(token).or_insert([0, 0])[class] += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<ModelArtifact, BackendError> {
        self.model.validate().map_err(BackendError::Fit)?;
        let bytes = serde_json::to_vec(&self.model).map_err(|err| BackendError::Fit(err.to_string()))?;
        Ok(ModelArtifact::new(bytes))
    }
}

/// Trained parameters as raw counts; probabilities are derived at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    format: String,
    version: u32,
    alpha: f64,
    /// Documents seen per class, `[negative, positive]`.
    documents: [u64; 2],
    /// Token occurrences per class.
    token_totals: [u64; 2],
    token_counts: BTreeMap<String, [u64; 2]>,
}

impl NaiveBayesModel {
    fn empty(alpha: f64) -> Self {
        Self {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            alpha,
            documents: [0, 0],
            token_totals: [0, 0],
            token_counts: BTreeMap::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.format != FORMAT_TAG {
            return Err(format!("unexpected format tag '{}'", self.format));
        }
        if self.version != FORMAT_VERSION {
            return Err(format!(
                "unsupported version {} (expected {FORMAT_VERSION})",
                self.version
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(format!("invalid smoothing constant {}", self.alpha));
        }
        if self.documents[NEG] == 0 || self.documents[POS] == 0 {
            return Err("model was not trained on both classes".to_string());
        }
        for class in [NEG, POS] {
            let sum: u64 = self.token_counts.values().map(|counts| counts[class]).sum();
            if sum != self.token_totals[class] {
                return Err("token totals do not match token counts".to_string());
            }
        }
        Ok(())
    }

    pub fn vocabulary_size(&self) -> usize {
        self.token_counts.len()
    }

    pub fn documents_seen(&self) -> u64 {
        self.documents[NEG] + self.documents[POS]
    }

    fn log_likelihood(&self, class: usize, count: u64) -> f64 {
        let vocab = self.token_counts.len() as f64;
        ((count as f64 + self.alpha) / (self.token_totals[class] as f64 + self.alpha * vocab)).ln()
    }
}

impl SentimentModel for NaiveBayesModel {
    fn positive_probability(&self, text: &str) -> f64 {
        let total_docs = self.documents_seen() as f64;
        let mut scores = [
            (self.documents[NEG] as f64 / total_docs).ln(),
            (self.documents[POS] as f64 / total_docs).ln(),
        ];
        for token in tokenize(text) {
            // Unseen tokens carry no evidence.
            let Some(counts) = self.token_counts.get(&token) else {
                continue;
            };
            for class in [NEG, POS] {
                scores[class] += self.log_likelihood(class, counts[class]);
            }
        }
        let max = scores[NEG].max(scores[POS]);
        let neg = (scores[NEG] - max).exp();
        let pos = (scores[POS] - max).exp();
        pos / (neg + pos)
    }
}
