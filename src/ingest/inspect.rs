//! Label distribution report for a data file, without training.

use std::collections::BTreeMap;

use serde::Serialize;

use super::labels::{ClassCounts, LabelClass, LabelVocabulary};
use super::schema::SchemaReader;

/// How the labels of one source spread over the vocabularies.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelDistribution {
    /// Occurrences of each trimmed raw label.
    pub raw_labels: BTreeMap<String, usize>,
    pub classes: ClassCounts,
    /// Rows dropped for empty content or label.
    pub empty_rows: usize,
    /// Raw labels that classified as invalid, with their counts.
    pub unrecognized: BTreeMap<String, usize>,
}

impl LabelDistribution {
    /// Tally the labels produced by `reader`.
    pub fn collect(reader: &SchemaReader, vocabulary: &LabelVocabulary) -> Self {
        let mut distribution = Self::default();
        let mut records = reader.records();
        for record in records.by_ref() {
            let label = record.raw_label.trim().to_string();
            let class = vocabulary.classify(&label);
            distribution.classes.add(class);
            if class == LabelClass::Invalid {
                *distribution.unrecognized.entry(label.clone()).or_default() += 1;
            }
            *distribution.raw_labels.entry(label).or_default() += 1;
        }
        distribution.empty_rows = records.skipped();
        distribution
    }

    /// Total rows read, empty ones included.
    pub fn total_rows(&self) -> usize {
        self.classes.total() + self.empty_rows
    }

    /// Share of rows with a recognized label, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        let total = self.total_rows();
        if total == 0 {
            return 0.0;
        }
        self.classes.usable() as f64 / total as f64
    }
}
