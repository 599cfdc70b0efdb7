//! Softmax exemplar selection.
//!
//! Exemplars are drawn from the pool with probability proportional to
//! `exp(beta * (w - w_max))` where `beta = 100 / temperature`. High
//! temperatures flatten the distribution toward exploration; low
//! temperatures approach greedy selection of the top-ranked entry.

use std::collections::HashSet;
use std::hash::Hash;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::score::l1_distance;
use super::store::{CandidateStore, ScoredProgram};

/// Weight assigned to already-visited entries. Larger than any achievable
/// weighted score by a wide margin so the threshold test cannot confuse
/// the two.
const SKIP_OVER: f64 = 1.0e38;

/// Draw an exemplar from the store, skipping visited trees.
///
/// When the diversity penalty is active and a previous exemplar exists,
/// every entry with a behavioral score is re-penalized by its closeness
/// to the previous exemplar before the draw. Returns `None` when every
/// tree has been visited.
pub(crate) fn select_exemplar<P: Clone + Eq + Hash>(
    store: &mut CandidateStore<P>,
    visited: &HashSet<P>,
    prev_bscore: Option<&[f64]>,
    temperature: f64,
    use_diversity_penalty: bool,
    rng: &mut StdRng,
) -> Option<ScoredProgram<P>> {
    if store.len() == 1 {
        let entry = store.best()?;
        return (!visited.contains(&entry.program)).then(|| entry.clone());
    }

    if use_diversity_penalty && let Some(prev) = prev_bscore {
        store.set_diversity_penalties(|entry| {
            if entry.bscore.is_empty() {
                0.0
            } else {
                1.0 / (1.0 + l1_distance(prev, &entry.bscore))
            }
        });
    }

    let complexity_weight = store.complexity_weight();
    let mut weights = Vec::with_capacity(store.len());
    let mut highest = f64::NEG_INFINITY;
    let mut found = false;
    for entry in store.iter() {
        if visited.contains(&entry.program) {
            weights.push(SKIP_OVER);
        } else {
            let w = entry.score.weighted(complexity_weight);
            if w > highest {
                highest = w;
            }
            found = true;
            weights.push(w);
        }
    }

    if !found {
        return None;
    }

    // Shift by the maximum so the exponentials cannot overflow.
    let beta = 100.0 / temperature;
    for w in &mut weights {
        *w = if *w >= 0.1 * SKIP_OVER {
            0.0
        } else {
            ((*w - highest) * beta).exp()
        };
    }

    let total: f64 = weights.iter().sum();
    assert!(total > 0.0, "selection weights must not all vanish");
    let dist = WeightedIndex::new(&weights).expect("checked positive total");
    let choice = dist.sample(rng);
    store.iter().nth(choice).cloned()
}
