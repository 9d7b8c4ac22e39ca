//! Neutral-label redistribution into a binary training set.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{BinaryExample, Sentiment};
use crate::ingest::{LabelClass, LabeledExample};

/// How neutral examples become binary ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeutralStrategy {
    /// Drop every neutral example.
    Exclude,
    /// Walk neutral examples in order, giving each to the class with fewer
    /// examples so far (assigned neutrals included). Ties go to Negative.
    AutoBalance,
    ForcePositive,
    ForceNegative,
    /// One fair draw per neutral example.
    Random { seed: u64 },
    /// Shuffle the neutral examples; the first `floor(n * positive_share)`
    /// become Positive and the rest Negative.
    Split { positive_share: f64, seed: u64 },
}

impl NeutralStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            NeutralStrategy::Exclude => StrategyKind::Exclude,
            NeutralStrategy::AutoBalance => StrategyKind::AutoBalance,
            NeutralStrategy::ForcePositive => StrategyKind::ForcePositive,
            NeutralStrategy::ForceNegative => StrategyKind::ForceNegative,
            NeutralStrategy::Random { .. } => StrategyKind::Random,
            NeutralStrategy::Split { .. } => StrategyKind::Split,
        }
    }
}

impl fmt::Display for NeutralStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeutralStrategy::Random { seed } => write!(f, "random (seed {seed})"),
            NeutralStrategy::Split {
                positive_share,
                seed,
            } => write!(f, "split ({:.0}% positive, seed {seed})", positive_share * 100.0),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Strategy name without parameters, as stored in config and history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Exclude,
    #[default]
    AutoBalance,
    ForcePositive,
    ForceNegative,
    Random,
    Split,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Exclude,
        StrategyKind::AutoBalance,
        StrategyKind::ForcePositive,
        StrategyKind::ForceNegative,
        StrategyKind::Random,
        StrategyKind::Split,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Exclude => "exclude",
            StrategyKind::AutoBalance => "auto_balance",
            StrategyKind::ForcePositive => "force_positive",
            StrategyKind::ForceNegative => "force_negative",
            StrategyKind::Random => "random",
            StrategyKind::Split => "split",
        }
    }

    /// Attach the parameters the random and split strategies need.
    pub fn with_params(self, seed: u64, positive_share: f64) -> NeutralStrategy {
        match self {
            StrategyKind::Exclude => NeutralStrategy::Exclude,
            StrategyKind::AutoBalance => NeutralStrategy::AutoBalance,
            StrategyKind::ForcePositive => NeutralStrategy::ForcePositive,
            StrategyKind::ForceNegative => NeutralStrategy::ForceNegative,
            StrategyKind::Random => NeutralStrategy::Random { seed },
            StrategyKind::Split => NeutralStrategy::Split {
                positive_share: positive_share.clamp(0.0, 1.0),
                seed,
            },
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exclude" => Ok(StrategyKind::Exclude),
            "auto_balance" | "balance" => Ok(StrategyKind::AutoBalance),
            "force_positive" | "positive" => Ok(StrategyKind::ForcePositive),
            "force_negative" | "negative" => Ok(StrategyKind::ForceNegative),
            "random" => Ok(StrategyKind::Random),
            "split" => Ok(StrategyKind::Split),
            other => Err(format!(
                "Unknown neutral strategy '{other}' (expected one of: {})",
                StrategyKind::ALL.map(|kind| kind.as_str()).join(", ")
            )),
        }
    }
}

/// What happened to the neutral examples during one redistribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedistributionSummary {
    pub neutral_seen: usize,
    pub neutral_to_positive: usize,
    pub neutral_to_negative: usize,
    pub neutral_dropped: usize,
    pub invalid_dropped: usize,
}

/// Resolve every neutral example and drop invalid ones. Relabeled examples
/// keep their position in the input order.
pub fn redistribute(
    examples: &[LabeledExample],
    strategy: &NeutralStrategy,
) -> (Vec<BinaryExample>, RedistributionSummary) {
    let mut summary = RedistributionSummary::default();
    let neutral_count = examples
        .iter()
        .filter(|example| example.class == LabelClass::Neutral)
        .count();
    let mut assign = NeutralAssigner::new(strategy, examples, neutral_count);

    let mut out = Vec::with_capacity(examples.len());
    for example in examples {
        let sentiment = match example.class {
            LabelClass::Positive => Some(Sentiment::Positive),
            LabelClass::Negative => Some(Sentiment::Negative),
            LabelClass::Invalid => {
                summary.invalid_dropped += 1;
                None
            }
            LabelClass::Neutral => {
                summary.neutral_seen += 1;
                let resolved = assign.next();
                match resolved {
                    Some(Sentiment::Positive) => summary.neutral_to_positive += 1,
                    Some(Sentiment::Negative) => summary.neutral_to_negative += 1,
                    None => summary.neutral_dropped += 1,
                }
                resolved
            }
        };
        if let Some(sentiment) = sentiment {
            out.push(BinaryExample::new(example.content.clone(), sentiment));
        }
    }
    (out, summary)
}

enum NeutralAssigner {
    Drop,
    Always(Sentiment),
    Balance { positive: usize, negative: usize },
    Random(StdRng),
    Planned(std::vec::IntoIter<Sentiment>),
}

impl NeutralAssigner {
    fn new(strategy: &NeutralStrategy, examples: &[LabeledExample], neutral_count: usize) -> Self {
        match *strategy {
            NeutralStrategy::Exclude => NeutralAssigner::Drop,
            NeutralStrategy::ForcePositive => NeutralAssigner::Always(Sentiment::Positive),
            NeutralStrategy::ForceNegative => NeutralAssigner::Always(Sentiment::Negative),
            NeutralStrategy::AutoBalance => {
                let count = |class: LabelClass| examples.iter().filter(|e| e.class == class).count();
                NeutralAssigner::Balance {
                    positive: count(LabelClass::Positive),
                    negative: count(LabelClass::Negative),
                }
            }
            NeutralStrategy::Random { seed } => NeutralAssigner::Random(StdRng::seed_from_u64(seed)),
            NeutralStrategy::Split {
                positive_share,
                seed,
            } => {
                let share = if positive_share.is_finite() {
                    positive_share.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let positive = ((neutral_count as f64) * share).floor() as usize;
                let mut plan: Vec<Sentiment> = (0..neutral_count)
                    .map(|idx| {
                        if idx < positive {
                            Sentiment::Positive
                        } else {
                            Sentiment::Negative
                        }
                    })
                    .collect();
                plan.shuffle(&mut StdRng::seed_from_u64(seed));
                NeutralAssigner::Planned(plan.into_iter())
            }
        }
    }

    fn next(&mut self) -> Option<Sentiment> {
        match self {
            NeutralAssigner::Drop => None,
            NeutralAssigner::Always(sentiment) => Some(*sentiment),
            NeutralAssigner::Balance { positive, negative } => {
                if *positive < *negative {
                    *positive += 1;
                    Some(Sentiment::Positive)
                } else {
                    *negative += 1;
                    Some(Sentiment::Negative)
                }
            }
            NeutralAssigner::Random(rng) => Some(if rng.random_bool(0.5) {
                Sentiment::Positive
            } else {
                Sentiment::Negative
            }),
            NeutralAssigner::Planned(plan) => plan.next(),
        }
    }
}
