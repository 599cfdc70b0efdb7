//! Transient pool of scored instances generated around one exemplar.

use super::score::{CompositeScore, Score};
use super::traits::{Instance, KnobSpec};

/// An instance together with the composite score it earned.
#[derive(Debug, Clone)]
pub struct ScoredInstance {
    pub instance: Instance,
    pub score: CompositeScore,
}

/// The deme: every instance evaluated for the current representation.
/// Lives for a single expansion cycle.
#[derive(Debug)]
pub struct Deme {
    fields: Vec<KnobSpec>,
    instances: Vec<ScoredInstance>,
}

impl Deme {
    pub fn new(fields: Vec<KnobSpec>) -> Self {
        Self {
            fields,
            instances: Vec::new(),
        }
    }

    /// Knob layout the instances are bound to.
    pub fn fields(&self) -> &[KnobSpec] {
        &self.fields
    }

    pub fn knob_count(&self) -> usize {
        self.fields.len()
    }

    pub fn push(&mut self, instance: Instance, score: CompositeScore) {
        self.instances.push(ScoredInstance { instance, score });
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn as_slice(&self) -> &[ScoredInstance] {
        &self.instances
    }

    /// Sort by weighted score, best first.
    pub fn sort_by_weighted(&mut self, complexity_weight: f64) {
        self.instances.sort_by(|a, b| {
            b.score
                .weighted(complexity_weight)
                .total_cmp(&a.score.weighted(complexity_weight))
        });
    }

    /// Pop instances off the tail while they score below `floor`.
    /// Assumes descending order. Returns the number removed.
    pub fn trim_tail(&mut self, floor: Score, complexity_weight: f64) -> usize {
        let before = self.instances.len();
        while let Some(last) = self.instances.last() {
            if last.score.weighted(complexity_weight) < floor {
                self.instances.pop();
            } else {
                break;
            }
        }
        before - self.instances.len()
    }
}
