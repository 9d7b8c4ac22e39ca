//! Fixed sentences for a quick look at a model's behaviour.

use serde::Serialize;

use super::Thresholds;
use crate::classifier::SentimentModel;
use crate::ingest::LabelClass;

pub const SMOKE_SENTENCES: &[&str] = &[
    "这个产品质量很好，非常满意！",
    "服务态度太差了，很不满意",
    "还可以吧，一般般",
    "物流速度很快，包装也不错",
    "价格有点贵，但质量确实好",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmokeResult {
    pub text: &'static str,
    pub positive_probability: f64,
    pub verdict: LabelClass,
}

/// Score every smoke sentence and bin it with `thresholds`.
pub fn smoke_test<M: SentimentModel + ?Sized>(model: &M, thresholds: &Thresholds) -> Vec<SmokeResult> {
    SMOKE_SENTENCES
        .iter()
        .map(|&text| {
            let positive_probability = model.positive_probability(text);
            SmokeResult {
                text,
                positive_probability,
                verdict: thresholds.classify(positive_probability),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl SentimentModel for Fixed {
        fn positive_probability(&self, _: &str) -> f64 {
            self.0
        }
    }

    #[test]
    fn every_sentence_is_scored() {
        let results = smoke_test(&Fixed(0.65), &Thresholds::default());
        assert_eq!(results.len(), SMOKE_SENTENCES.len());
        assert!(results.iter().all(|r| r.verdict == LabelClass::Positive));
        let neutral = smoke_test(&Fixed(0.5), &Thresholds::default());
        assert!(neutral.iter().all(|r| r.verdict == LabelClass::Neutral));
    }
}
