//! End-to-end searches on the bundled expression space.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use metapop::expr::{
    Dataset, Expr, ExprSpace, RegressionBscorer, RegressionScorer,
};
use metapop::optimize::HillClimber;
use metapop::schema::SearchConfig;
use metapop::search::{
    Domination, Metapopulation, StopReason, dominates,
};

type Engine = Metapopulation<
    ExprSpace,
    RegressionScorer,
    RegressionBscorer,
    HillClimber,
>;

/// Training table for y = 2x + 1.
fn line_dataset() -> Arc<Dataset> {
    let rows: Vec<Vec<f64>> = (-5..=5).map(|x| vec![x as f64]).collect();
    let targets = rows.iter().map(|r| 2.0 * r[0] + 1.0).collect();
    Arc::new(Dataset { rows, targets })
}

fn test_config(seed: u64) -> SearchConfig {
    SearchConfig {
        random_seed: Some(seed),
        complexity_weight: 0.01,
        ..SearchConfig::default()
    }
}

fn default_seeds() -> Vec<Expr> {
    // 1*x + 0.5: reduction keeps the literals, so constant knobs exist.
    vec![Expr::Add(
        Box::new(Expr::Mul(
            Box::new(Expr::Num(1.0)),
            Box::new(Expr::Var(0)),
        )),
        Box::new(Expr::Num(0.5)),
    )]
}

fn build_engine(config: SearchConfig, seeds: Vec<Expr>) -> Engine {
    let dataset = line_dataset();
    Metapopulation::new(
        ExprSpace::new(1),
        RegressionScorer::new(Arc::clone(&dataset)),
        RegressionBscorer::new(dataset, 0.0),
        HillClimber::new(config.random_seed.unwrap_or(1)),
        seeds,
        config,
    )
    .unwrap()
}

#[test]
fn test_run_stops_on_evaluation_budget() {
    let mut engine = build_engine(test_config(42), default_seeds());
    let result = engine.run(300);

    assert_eq!(result.stop_reason, StopReason::EvaluationBudget);
    assert!(result.evaluations >= 300);
    assert!(result.expansions >= 1);
    assert_eq!(result.metapop_size, engine.len());
}

#[test]
fn test_search_improves_on_learnable_line() {
    let mut engine = build_engine(test_config(42), default_seeds());
    let initial = engine.best_score().score;

    let result = engine.run(20_000);

    // The seed 1*x + 0.5 misfits y = 2x + 1; constant knobs can close
    // most of the gap.
    assert!(result.best_score.score > initial);
    assert!(!result.best_programs.is_empty());
}

#[test]
fn test_best_score_is_monotone_across_cycles() {
    let mut engine = build_engine(test_config(7), default_seeds());
    let mut previous = engine.best_score().score;

    for _ in 0..5 {
        if engine.expand(2_000).is_err() {
            break;
        }
        let current = engine.best_score().score;
        assert!(current >= previous);
        previous = current;
    }
}

#[test]
fn test_exhaustion_without_revisit() {
    // A bare variable in a single-input space yields no knobs, so every
    // cycle ends in an empty representation.
    let mut engine = build_engine(test_config(3), vec![Expr::Var(0)]);
    let result = engine.run(10_000);

    assert_eq!(result.stop_reason, StopReason::Exhausted);
    assert_eq!(result.expansions, 0);
}

#[test]
fn test_exhaustion_with_revisit_still_terminates() {
    let config = SearchConfig {
        revisit: true,
        ..test_config(3)
    };
    let mut engine = build_engine(config, vec![Expr::Var(0)]);
    let result = engine.run(10_000);

    // The visited set is cleared once, then the run gives up.
    assert_eq!(result.stop_reason, StopReason::Exhausted);
}

#[test]
fn test_cancellation() {
    let mut engine = build_engine(test_config(5), default_seeds());
    let cancel = engine.cancel_handle();
    cancel.store(true, Ordering::Relaxed);

    let result = engine.run(100_000);
    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(result.evaluations, 0);
}

#[test]
fn test_merge_callback_terminates_run() {
    let mut engine = build_engine(test_config(5), default_seeds());
    engine.set_merge_callback(|_| true);

    let result = engine.run(100_000);
    assert_eq!(result.stop_reason, StopReason::MergeCallback);
    assert_eq!(result.expansions, 1);
}

#[test]
fn test_merge_callback_sees_candidates() {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    let seen = Arc::new(AtomicUsize::new(0));
    let scores: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));

    let mut engine = build_engine(test_config(5), default_seeds());
    let seen_in = Arc::clone(&seen);
    let scores_in = Arc::clone(&scores);
    engine.set_merge_callback(move |candidates| {
        seen_in.fetch_add(candidates.len(), Ordering::Relaxed);
        let mut lock = scores_in.lock().unwrap();
        lock.extend(candidates.iter().map(|c| c.score.score));
        false
    });

    engine.run(2_000);

    assert!(seen.load(Ordering::Relaxed) > 0);
    assert!(scores.lock().unwrap().iter().all(|s| s.is_finite()));
}

#[test]
fn test_no_dominated_entries_when_filtering() {
    let config = SearchConfig {
        include_dominated: false,
        ..test_config(11)
    };
    let mut engine = build_engine(config, default_seeds());
    engine.run(5_000);

    let entries: Vec<_> = engine
        .candidates()
        .filter(|e| !e.bscore.is_empty())
        .collect();
    for a in &entries {
        for b in &entries {
            if !std::ptr::eq(*a, *b) {
                assert_ne!(
                    dominates(&a.bscore, &b.bscore),
                    Domination::Worse,
                    "{} is dominated by {}",
                    a.program,
                    b.program
                );
            }
        }
    }
}

#[test]
fn test_diversity_penalty_run_completes() {
    let config = SearchConfig {
        use_diversity_penalty: true,
        ..test_config(13)
    };
    let mut engine = build_engine(config, default_seeds());
    let result = engine.run(3_000);

    assert!(result.evaluations > 0);
    // Candidates get behavioral scores so the penalty can be computed.
    assert!(engine.candidates().any(|e| !e.bscore.is_empty()));
}

#[test]
fn test_parallel_run_matches_serial_budget_use() {
    let serial = build_engine(test_config(21), default_seeds()).run(2_000);
    let parallel = build_engine(
        SearchConfig {
            jobs: 4,
            ..test_config(21)
        },
        default_seeds(),
    )
    .run(2_000);

    // Candidate extraction order may differ, but both must run to the
    // budget and find a finite best.
    assert_eq!(serial.stop_reason, StopReason::EvaluationBudget);
    assert_eq!(parallel.stop_reason, StopReason::EvaluationBudget);
    assert!(parallel.best_score.score.is_finite());
}

#[test]
fn test_determinism_for_fixed_seed() {
    let run = |seed| {
        let mut engine = build_engine(test_config(seed), default_seeds());
        let result = engine.run(3_000);
        (result.best_score.score, result.evaluations, result.metapop_size)
    };
    assert_eq!(run(99), run(99));
}

#[test]
fn test_visited_trees_stay_visited() {
    let mut engine = build_engine(test_config(17), default_seeds());

    let mut snapshots: Vec<usize> = Vec::new();
    for _ in 0..3 {
        if engine.expand(1_000).is_err() {
            break;
        }
        snapshots.push(engine.visited().len());
    }

    assert!(snapshots.windows(2).all(|w| w[0] <= w[1]));
    assert!(*snapshots.last().unwrap() >= 1);
}

#[test]
fn test_max_candidates_bounds_pool_growth() {
    let config = SearchConfig {
        max_candidates: Some(2),
        ..test_config(23)
    };
    let mut engine = build_engine(config, default_seeds());

    engine.expand(1_000).unwrap();
    // Seed plus at most two merged candidates.
    assert!(engine.len() <= 3, "pool has {} entries", engine.len());
}
