//! Capability contracts supplied by the program domain: tree operations,
//! representation building, scoring and inner optimization.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

use super::deme::Deme;
use super::score::{CompositeScore, PenalizedBscore};

pub use crate::schema::OperatorSet;

/// Canonical name of the k-th input argument operator (1-based), as it
/// appears in ignored-operator sets and candidate dumps.
pub fn argument(index: usize) -> String {
    format!("${index}")
}

/// Program trees handled by the engine: opaque values with structural
/// equality and hashing.
pub trait Program: Clone + Eq + Hash + fmt::Display + Send + Sync {}

impl<T: Clone + Eq + Hash + fmt::Display + Send + Sync> Program for T {}

/// Knob settings vector: one signed setting per knob, zero meaning the
/// exemplar's own value.
pub type Instance = Vec<i16>;

/// Admissible setting range of a single knob, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnobSpec {
    pub min: i16,
    pub max: i16,
}

/// Tree operations and representation building for one program domain.
pub trait ProgramSpace {
    type Program: Program;
    type Repr: Representation<Program = Self::Program>;

    /// Reduce a tree to a simpler equivalent form.
    fn reduce(&self, program: &Self::Program) -> Self::Program;

    /// Complexity of a tree. Lower is better.
    fn complexity(&self, program: &Self::Program) -> u64;

    /// Decorate `exemplar` with knobs, skipping the named operators.
    /// Returns `None` when no knobs can be attached.
    fn build_repr(
        &self,
        exemplar: &Self::Program,
        ignore_ops: &OperatorSet,
    ) -> Option<Self::Repr>;
}

/// Mapping from knob settings onto concrete candidate trees. Owned by a
/// single expansion cycle.
pub trait Representation: Send + Sync {
    type Program;

    /// Layout of the knob set.
    fn fields(&self) -> &[KnobSpec];

    fn knob_count(&self) -> usize {
        self.fields().len()
    }

    /// Materialise the tree encoded by `instance`.
    fn candidate(&self, instance: &Instance, reduce: bool) -> Self::Program;
}

/// Composite scoring of candidate trees. Must be pure (equal trees yield
/// equal scores) and re-entrant.
pub trait CompositeScorer<P>: Send + Sync {
    fn composite(&self, program: &P) -> CompositeScore;
}

/// Behavioral scoring of candidate trees: a per-example error vector plus
/// an externally applied penalty. Potentially expensive; must tolerate
/// parallel calls.
pub trait BehavioralScorer<P>: Send + Sync {
    fn behavioral(&self, program: &P) -> PenalizedBscore;
}

/// Inner optimizer failure. The engine discards the current deme and
/// counts zero evaluations for the cycle.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct OptimizerError(pub String);

/// Neighborhood optimizer invoked once per expansion cycle.
pub trait Optimizer {
    /// Populate `deme` with scored instances, spending at most `max_evals`
    /// scorer calls. Returns the number of evaluations actually consumed.
    fn optimize(
        &mut self,
        deme: &mut Deme,
        scorer: &(dyn Fn(&Instance) -> CompositeScore + Sync),
        max_evals: u64,
    ) -> Result<u64, OptimizerError>;
}

/// Optional feature selection around an exemplar. The engine adds the
/// argument operators for the non-selected columns to the ignored set
/// before building the representation.
pub trait FeatureSelector<P> {
    /// Number of input columns.
    fn arity(&self) -> usize;

    /// Column indices judged informative in the context of `exemplar`.
    fn select(&self, exemplar: &P) -> BTreeSet<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_names() {
        assert_eq!(argument(1), "$1");
        assert_eq!(argument(12), "$12");
    }
}
