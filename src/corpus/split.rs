//! Deterministic train/holdout split keyed on example content.

use crate::ingest::LabeledExample;

/// Examples partitioned into a training part and a held-out part.
#[derive(Debug, Clone, Default)]
pub struct HoldoutSplit {
    pub train: Vec<LabeledExample>,
    pub holdout: Vec<LabeledExample>,
}

/// Hold out roughly `fraction` of `examples`. Membership depends only on the
/// content and `seed`, so duplicate texts always land on the same side.
pub fn holdout_split(examples: Vec<LabeledExample>, fraction: f64, seed: u64) -> HoldoutSplit {
    let mut split = HoldoutSplit::default();
    for example in examples {
        if split_u01(&example.content, seed) < fraction {
            split.holdout.push(example);
        } else {
            split.train.push(example);
        }
    }
    split
}

fn split_u01(content: &str, seed: u64) -> f64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    raw as f64 / u32::MAX as f64
}
