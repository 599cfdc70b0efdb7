//! Score algebra for ranking and comparing candidate programs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw fitness score. Higher is better.
pub type Score = f64;

/// Program complexity. Lower is better.
pub type Complexity = u64;

/// Sentinel for invalid or uninitialised scores. Compares strictly below
/// any finite score the engine can produce.
pub const WORST_SCORE: Score = -(f64::MAX - 1.0);

/// Per-example error vector used for Pareto comparisons and behavioral
/// distances. Lower entries are better. May be empty when behavioral
/// scoring was skipped.
pub type BehavioralScore = Vec<f64>;

/// A behavioral score together with a uniformly applied scalar penalty.
/// The penalty is produced by the scoring layer; the engine only reads
/// the raw vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PenalizedBscore {
    pub bscore: BehavioralScore,
    pub penalty: f64,
}

/// Ranking triple of raw score, complexity and diversity penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Raw fitness score.
    pub score: Score,
    /// Complexity of the scored tree.
    pub complexity: Complexity,
    /// Penalty for behavioral similarity to the previous exemplar.
    #[serde(default)]
    pub diversity_penalty: f64,
}

impl CompositeScore {
    pub fn new(score: Score, complexity: Complexity) -> Self {
        Self {
            score,
            complexity,
            diversity_penalty: 0.0,
        }
    }

    /// The score no candidate can do worse than.
    pub const fn worst() -> Self {
        Self {
            score: WORST_SCORE,
            complexity: Complexity::MAX,
            diversity_penalty: 0.0,
        }
    }

    /// Weighted score `s - d - k*c` used for ordering and softmax
    /// selection, for a given complexity weight `k`.
    pub fn weighted(&self, complexity_weight: f64) -> Score {
        self.score - self.diversity_penalty - complexity_weight * self.complexity as f64
    }
}

impl fmt::Display for CompositeScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[score={}, complexity={}]", self.score, self.complexity)
    }
}

/// Outcome of a behavioral-score comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domination {
    /// Strictly better in at least one coordinate, worse in none.
    Better,
    /// Strictly worse in at least one coordinate, better in none.
    Worse,
    /// Neither side dominates.
    Incomparable,
}

/// Compare two behavioral scores coordinate-wise. Lower entries are better.
///
/// An empty vector is vacuously dominated by any non-empty one; two empty
/// vectors are incomparable. Non-empty vectors must have equal length.
pub fn dominates(x: &[f64], y: &[f64]) -> Domination {
    if x.is_empty() {
        return if y.is_empty() {
            Domination::Incomparable
        } else {
            Domination::Worse
        };
    }
    if y.is_empty() {
        return Domination::Better;
    }
    assert_eq!(
        x.len(),
        y.len(),
        "behavioral scores must have equal length"
    );

    let mut any_better = false;
    let mut any_worse = false;
    for (a, b) in x.iter().zip(y) {
        if a < b {
            any_better = true;
        } else if b < a {
            any_worse = true;
        }
        if any_better && any_worse {
            return Domination::Incomparable;
        }
    }
    match (any_better, any_worse) {
        (true, false) => Domination::Better,
        (false, true) => Domination::Worse,
        _ => Domination::Incomparable,
    }
}

/// L1 distance between two behavioral scores. Unmatched tail entries
/// contribute their absolute value.
pub fn l1_distance(x: &[f64], y: &[f64]) -> f64 {
    let common: f64 = x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum();
    let tail: f64 = if x.len() > y.len() {
        x[y.len()..].iter().map(|v| v.abs()).sum()
    } else {
        y[x.len()..].iter().map(|v| v.abs()).sum()
    };
    common + tail
}
