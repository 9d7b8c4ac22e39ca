use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::corpus::{NeutralStrategy, StrategyKind};

/// Settings persisted in `sentrain.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Installed model slot. Defaults to `models/sentiment.model` under the app root.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub labels: LabelSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
}

impl Settings {
    pub(crate) fn normalized(mut self) -> Self {
        self.ingest.sniff_bytes = self.ingest.sniff_bytes.max(MIN_SNIFF_BYTES);
        self.ingest.sniff_lines = self.ingest.sniff_lines.clamp(1, MAX_SNIFF_LINES);
        self.training.split_positive_share = clamp_unit(self.training.split_positive_share);
        self.training.progress_stride = self.training.progress_stride.clamp(1, MAX_PROGRESS_STRIDE);
        self.training.holdout_fraction =
            clamp_unit(self.training.holdout_fraction).min(MAX_HOLDOUT_FRACTION);
        let low = clamp_unit(self.evaluation.negative_threshold);
        let high = clamp_unit(self.evaluation.positive_threshold);
        self.evaluation.negative_threshold = low.min(high);
        self.evaluation.positive_threshold = low.max(high);
        self
    }
}

/// Input sniffing.
///
/// Config keys: `sniff_bytes`, `sniff_lines`, `legacy_encodings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Bytes of each file examined when detecting encoding and delimiter.
    #[serde(default = "default_sniff_bytes")]
    pub sniff_bytes: usize,
    /// Non-blank lines examined when counting delimiters.
    #[serde(default = "default_sniff_lines")]
    pub sniff_lines: usize,
    /// WHATWG labels of the legacy encodings tried after UTF-8, in order.
    /// Narrower encodings must come before broader ones (`gbk` last).
    #[serde(default = "default_legacy_encodings")]
    pub legacy_encodings: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            sniff_bytes: default_sniff_bytes(),
            sniff_lines: default_sniff_lines(),
            legacy_encodings: default_legacy_encodings(),
        }
    }
}

/// Label tokens recognized in addition to the built-in vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSettings {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
    #[serde(default)]
    pub neutral: Vec<String>,
}

/// Config keys: `neutral_strategy`, `seed`, `split_positive_share`,
/// `progress_stride`, `holdout_fraction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default)]
    pub neutral_strategy: StrategyKind,
    /// Seed for the random and split strategies and the holdout split.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Share of neutral examples relabeled positive by the split strategy.
    #[serde(default = "default_split_positive_share")]
    pub split_positive_share: f64,
    /// Emit a progress event every this many examples.
    #[serde(default = "default_progress_stride")]
    pub progress_stride: usize,
    /// Fraction of training rows hashed out for before/after accuracy when
    /// no held-out files are given. Zero trains on every row.
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
}

impl TrainingSettings {
    /// Resolve the configured strategy with its parameters.
    pub fn neutral_strategy(&self) -> NeutralStrategy {
        self.neutral_strategy
            .with_params(self.seed, self.split_positive_share)
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            neutral_strategy: StrategyKind::default(),
            seed: default_seed(),
            split_positive_share: default_split_positive_share(),
            progress_stride: default_progress_stride(),
            holdout_fraction: default_holdout_fraction(),
        }
    }
}

/// Cut points for three-way scoring of the positive probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: f64,
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            negative_threshold: default_negative_threshold(),
            positive_threshold: default_positive_threshold(),
        }
    }
}
