//! Raw label vocabulary → sentiment class.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LabelSettings;

const POSITIVE_TOKENS: &[&str] = &[
    "positive", "good", "excellent", "正面", "积极", "正向", "好", "很好", "棒", "1",
];
const NEGATIVE_TOKENS: &[&str] = &[
    "negative", "bad", "poor", "负面", "消极", "负向", "差", "不好", "坏", "0",
];
const NEUTRAL_TOKENS: &[&str] = &["neutral", "中性", "中立", "一般", "2"];

/// Class assigned to a raw label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelClass {
    Positive,
    Negative,
    Neutral,
    /// Matches no vocabulary. Never trained on or scored.
    Invalid,
}

impl LabelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelClass::Positive => "positive",
            LabelClass::Negative => "negative",
            LabelClass::Neutral => "neutral",
            LabelClass::Invalid => "invalid",
        }
    }
}

impl fmt::Display for LabelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub invalid: usize,
}

impl ClassCounts {
    pub fn add(&mut self, class: LabelClass) {
        match class {
            LabelClass::Positive => self.positive += 1,
            LabelClass::Negative => self.negative += 1,
            LabelClass::Neutral => self.neutral += 1,
            LabelClass::Invalid => self.invalid += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral + self.invalid
    }

    /// Examples with a recognized label.
    pub fn usable(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

impl FromIterator<LabelClass> for ClassCounts {
    fn from_iter<I: IntoIterator<Item = LabelClass>>(iter: I) -> Self {
        let mut counts = ClassCounts::default();
        for class in iter {
            counts.add(class);
        }
        counts
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("Label token '{token}' is configured as both {first} and {second}")]
    Conflict {
        token: String,
        first: LabelClass,
        second: LabelClass,
    },
}

/// Case-insensitive exact-match vocabulary.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    tokens: HashMap<String, LabelClass>,
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LabelVocabulary {
    /// The built-in multilingual vocabulary with numeric codes `1`/`0`/`2`.
    pub fn builtin() -> Self {
        let mut tokens = HashMap::new();
        for (list, class) in [
            (POSITIVE_TOKENS, LabelClass::Positive),
            (NEGATIVE_TOKENS, LabelClass::Negative),
            (NEUTRAL_TOKENS, LabelClass::Neutral),
        ] {
            for token in list {
                tokens.insert(token.to_string(), class);
            }
        }
        Self { tokens }
    }

    /// Built-in vocabulary extended with configured tokens.
    pub fn with_extra(settings: &LabelSettings) -> Result<Self, VocabularyError> {
        let mut vocabulary = Self::builtin();
        for (list, class) in [
            (&settings.positive, LabelClass::Positive),
            (&settings.negative, LabelClass::Negative),
            (&settings.neutral, LabelClass::Neutral),
        ] {
            for token in list {
                vocabulary.insert(token, class)?;
            }
        }
        Ok(vocabulary)
    }

    fn insert(&mut self, token: &str, class: LabelClass) -> Result<(), VocabularyError> {
        let key = token.trim().to_lowercase();
        if key.is_empty() {
            return Ok(());
        }
        match self.tokens.get(&key) {
            Some(&existing) if existing != class => Err(VocabularyError::Conflict {
                token: key,
                first: existing,
                second: class,
            }),
            Some(_) => Ok(()),
            None => {
                self.tokens.insert(key, class);
                Ok(())
            }
        }
    }

    /// Classify a raw label cell.
    pub fn classify(&self, raw: &str) -> LabelClass {
        let key = raw.trim().to_lowercase();
        if let Some(&class) = self.tokens.get(&key) {
            return class;
        }
        match numeric_code(&key) {
            Some(code) => self
                .tokens
                .get(code)
                .copied()
                .unwrap_or(LabelClass::Invalid),
            None => LabelClass::Invalid,
        }
    }
}

/// `1.0`, `0.00`, `2.` → the bare numeric code.
fn numeric_code(key: &str) -> Option<&'static str> {
    let (whole, fraction) = key.split_once('.')?;
    if !fraction.chars().all(|c| c == '0') {
        return None;
    }
    match whole {
        "1" => Some("1"),
        "0" => Some("0"),
        "2" => Some("2"),
        _ => None,
    }
}
