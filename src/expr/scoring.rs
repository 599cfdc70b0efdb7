//! Regression scorers over a numeric dataset.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::search::{
    BehavioralScorer, CompositeScore, CompositeScorer, PenalizedBscore,
};

use super::Expr;

/// A training table: input rows and their target outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    /// Number of training examples.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of input columns.
    pub fn arity(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// Composite scorer: negated sum of squared errors over the dataset,
/// with the tree's node count as complexity.
#[derive(Debug, Clone)]
pub struct RegressionScorer {
    dataset: Arc<Dataset>,
}

impl RegressionScorer {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

impl CompositeScorer<Expr> for RegressionScorer {
    fn composite(&self, program: &Expr) -> CompositeScore {
        let mut total = 0.0;
        for (row, target) in
            self.dataset.rows.iter().zip(&self.dataset.targets)
        {
            let err = program.eval(row) - target;
            total += err * err;
        }
        if !total.is_finite() {
            return CompositeScore::worst();
        }
        CompositeScore::new(-total, program.complexity())
    }
}

/// Behavioral scorer: one squared-error entry per training row,
/// optionally followed by a complexity-penalty entry.
#[derive(Debug, Clone)]
pub struct RegressionBscorer {
    dataset: Arc<Dataset>,
    complexity_coef: f64,
}

impl RegressionBscorer {
    /// A `complexity_coef` of zero disables the trailing penalty entry.
    pub fn new(dataset: Arc<Dataset>, complexity_coef: f64) -> Self {
        Self {
            dataset,
            complexity_coef,
        }
    }
}

impl BehavioralScorer<Expr> for RegressionBscorer {
    fn behavioral(&self, program: &Expr) -> PenalizedBscore {
        let mut bscore: Vec<f64> = self
            .dataset
            .rows
            .iter()
            .zip(&self.dataset.targets)
            .map(|(row, target)| {
                let err = program.eval(row) - target;
                err * err
            })
            .collect();
        if self.complexity_coef > 0.0 {
            bscore.push(program.complexity() as f64 * self.complexity_coef);
        }
        PenalizedBscore {
            bscore,
            penalty: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::WORST_SCORE;

    fn dataset() -> Arc<Dataset> {
        // y = x^2 over three points.
        Arc::new(Dataset {
            rows: vec![vec![0.0], vec![1.0], vec![2.0]],
            targets: vec![0.0, 1.0, 4.0],
        })
    }

    #[test]
    fn test_perfect_fit_scores_zero() {
        let scorer = RegressionScorer::new(dataset());
        let square =
            Expr::Mul(Box::new(Expr::Var(0)), Box::new(Expr::Var(0)));
        let score = scorer.composite(&square);
        assert_eq!(score.score, 0.0);
        assert_eq!(score.complexity, 3);
    }

    #[test]
    fn test_errors_accumulate_negatively() {
        let scorer = RegressionScorer::new(dataset());
        let flat = Expr::Num(0.0);
        // Squared errors: 0 + 1 + 16.
        assert_eq!(scorer.composite(&flat).score, -17.0);
    }

    #[test]
    fn test_non_finite_scores_worst() {
        let scorer = RegressionScorer::new(dataset());
        let mut tree = Expr::Num(f64::MAX);
        for _ in 0..4 {
            tree = Expr::Mul(Box::new(tree.clone()), Box::new(tree));
        }
        assert_eq!(scorer.composite(&tree).score, WORST_SCORE);
    }

    #[test]
    fn test_behavioral_entries_per_row() {
        let bscorer = RegressionBscorer::new(dataset(), 0.0);
        let flat = Expr::Num(0.0);
        let pbs = bscorer.behavioral(&flat);
        assert_eq!(pbs.bscore, vec![0.0, 1.0, 16.0]);
    }

    #[test]
    fn test_complexity_penalty_entry() {
        let bscorer = RegressionBscorer::new(dataset(), 0.5);
        let square =
            Expr::Mul(Box::new(Expr::Var(0)), Box::new(Expr::Var(0)));
        let pbs = bscorer.behavioral(&square);
        assert_eq!(pbs.bscore.len(), 4);
        assert_eq!(*pbs.bscore.last().unwrap(), 1.5);
    }
}
