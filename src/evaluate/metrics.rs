//! Confusion matrix and per-class statistics.

use serde::Serialize;

/// Confusion matrix for a `K`-class decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Out-of-range indices are ignored.
    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&count| count as u64).sum()
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerClassStats {
    /// `TP / (TP + FP)`, 0 when nothing was predicted as the class.
    pub precision: f64,
    /// `TP / (TP + FN)`, 0 when the class has no examples.
    pub recall: f64,
    /// Number of true examples of the class.
    pub support: u32,
}

pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    (0..k)
        .map(|class_idx| {
            let tp = cm.get(class_idx, class_idx) as f64;
            let support: u32 = (0..k).map(|j| cm.get(class_idx, j)).sum();
            let predicted: u32 = (0..k).map(|i| cm.get(i, class_idx)).sum();
            let precision = if predicted == 0 { 0.0 } else { tp / predicted as f64 };
            let recall = if support == 0 { 0.0 } else { tp / support as f64 };
            PerClassStats {
                precision,
                recall,
                support,
            }
        })
        .collect()
}

/// Share of the diagonal; 0 for an empty matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|idx| cm.get(idx, idx) as u64).sum();
    correct as f64 / total as f64
}
