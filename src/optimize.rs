//! Hill-climbing optimizer over knob instances.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::search::{
    CompositeScore, Deme, Instance, Optimizer, OptimizerError,
};

/// Restarts tolerated without improvement before giving up on a deme.
const DEFAULT_MAX_RESTARTS: u32 = 2;

/// Neighborhood hill climber with random restarts.
///
/// Starts from the all-zero instance, scores the one-step neighborhood of
/// the current center and re-centers on the best improving neighbor. When
/// a neighborhood yields no improvement, the climber jumps to a random
/// instance; after a few fruitless jumps it stops. Every evaluated
/// instance is recorded in the deme.
#[derive(Debug)]
pub struct HillClimber {
    rng: StdRng,
    max_restarts: u32,
}

impl HillClimber {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    fn random_instance(&mut self, deme: &Deme) -> Instance {
        deme.fields()
            .iter()
            .map(|spec| {
                let jump: f64 = self.rng.sample(StandardNormal);
                let span = (spec.max - spec.min) as f64 / 4.0;
                ((jump * span).round() as i16).clamp(spec.min, spec.max)
            })
            .collect()
    }
}

impl Optimizer for HillClimber {
    fn optimize(
        &mut self,
        deme: &mut Deme,
        scorer: &(dyn Fn(&Instance) -> CompositeScore + Sync),
        max_evals: u64,
    ) -> Result<u64, OptimizerError> {
        if deme.knob_count() == 0 || max_evals == 0 {
            return Ok(0);
        }

        let fields = deme.fields().to_vec();
        let mut used = 0u64;
        let mut restarts = 0u32;

        let mut center: Instance = vec![0; fields.len()];
        let mut center_score = scorer(&center);
        deme.push(center.clone(), center_score);
        used += 1;

        'search: while used < max_evals {
            let mut best_neighbor: Option<(Instance, CompositeScore)> = None;

            for (knob, spec) in fields.iter().enumerate() {
                for delta in [-1i16, 1] {
                    if used >= max_evals {
                        break 'search;
                    }
                    let setting = center[knob] + delta;
                    if setting < spec.min || setting > spec.max {
                        continue;
                    }
                    let mut neighbor = center.clone();
                    neighbor[knob] = setting;
                    let score = scorer(&neighbor);
                    used += 1;
                    deme.push(neighbor.clone(), score);

                    let improves_best = best_neighbor
                        .as_ref()
                        .is_none_or(|(_, s)| score.score > s.score);
                    if improves_best {
                        best_neighbor = Some((neighbor, score));
                    }
                }
            }

            match best_neighbor {
                Some((instance, score))
                    if score.score > center_score.score =>
                {
                    center = instance;
                    center_score = score;
                }
                _ => {
                    if restarts >= self.max_restarts || used >= max_evals {
                        break;
                    }
                    restarts += 1;
                    center = self.random_instance(deme);
                    center_score = scorer(&center);
                    deme.push(center.clone(), center_score);
                    used += 1;
                }
            }
        }

        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::KnobSpec;

    fn quadratic_deme() -> Deme {
        Deme::new(vec![
            KnobSpec { min: -8, max: 8 },
            KnobSpec { min: -8, max: 8 },
        ])
    }

    /// Peak at (3, -2); strictly concave.
    fn quadratic(instance: &Instance) -> CompositeScore {
        let x = instance[0] as f64;
        let y = instance[1] as f64;
        let value = -((x - 3.0).powi(2) + (y + 2.0).powi(2));
        CompositeScore::new(value, 1)
    }

    #[test]
    fn test_climbs_to_peak() {
        let mut climber = HillClimber::new(5);
        let mut deme = quadratic_deme();
        let used = climber
            .optimize(&mut deme, &quadratic, 500)
            .unwrap();

        assert!(used > 0);
        let best = deme
            .as_slice()
            .iter()
            .map(|i| i.score.score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best, 0.0);
    }

    #[test]
    fn test_respects_budget() {
        let mut climber = HillClimber::new(5);
        let mut deme = quadratic_deme();
        let used = climber.optimize(&mut deme, &quadratic, 10).unwrap();

        assert!(used <= 10);
        assert_eq!(deme.len() as u64, used);
    }

    #[test]
    fn test_empty_layout_is_a_no_op() {
        let mut climber = HillClimber::new(5);
        let mut deme = Deme::new(Vec::new());
        let used = climber.optimize(&mut deme, &quadratic, 100).unwrap();
        assert_eq!(used, 0);
        assert!(deme.is_empty());
    }

    #[test]
    fn test_deterministic_for_seed() {
        let run = |seed| {
            let mut climber = HillClimber::new(seed);
            let mut deme = quadratic_deme();
            climber.optimize(&mut deme, &quadratic, 200).unwrap();
            deme.as_slice()
                .iter()
                .map(|i| i.instance.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }
}
