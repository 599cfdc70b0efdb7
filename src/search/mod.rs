//! Metapopulation search over symbolic programs.
//!
//! The engine maintains a bounded pool of scored candidate programs and
//! improves it in expansion cycles:
//!
//! - **Score algebra** (`score`): composite and behavioral scores, the
//!   weighted ranking projection and Pareto domination.
//! - **Candidate store** (`store`): the pool itself, ordered by weighted
//!   score with O(1) lookup by tree.
//! - **Selection** (`select`): softmax exemplar draws with visited-set
//!   exclusion and an optional diversity penalty.
//! - **Deme** (`deme`): the transient neighborhood built around one
//!   exemplar.
//! - **Pareto filtering** (`pareto`): parallel non-dominated filtering
//!   used when dominated candidates are excluded from merging.
//! - **Engine** (`engine`): the driver tying the pieces together.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use metapop::expr::{Dataset, Expr, ExprSpace, RegressionBscorer, RegressionScorer};
//! use metapop::optimize::HillClimber;
//! use metapop::schema::SearchConfig;
//! use metapop::search::Metapopulation;
//!
//! let dataset = Arc::new(Dataset {
//!     rows: vec![vec![0.0], vec![1.0], vec![2.0]],
//!     targets: vec![1.0, 3.0, 5.0],
//! });
//!
//! let mut engine = Metapopulation::new(
//!     ExprSpace::new(dataset.arity()),
//!     RegressionScorer::new(Arc::clone(&dataset)),
//!     RegressionBscorer::new(Arc::clone(&dataset), 0.0),
//!     HillClimber::new(1),
//!     vec![Expr::Add(Box::new(Expr::Var(0)), Box::new(Expr::Num(0.5)))],
//!     SearchConfig::default(),
//! )
//! .unwrap();
//!
//! let result = engine.run(10_000);
//! println!("best {}: {} programs", result.best_score, result.best_programs.len());
//! ```

mod deme;
mod engine;
mod pareto;
mod score;
mod select;
mod store;
mod traits;

pub use deme::{Deme, ScoredInstance};
pub use engine::{
    MIN_POOL, MergeCallback, Metapopulation, SearchError, SearchResult,
    StopReason,
};
pub use pareto::remove_dominated;
pub use score::{
    BehavioralScore, Complexity, CompositeScore, Domination, PenalizedBscore,
    Score, WORST_SCORE, dominates, l1_distance,
};
pub use store::{CandidateStore, ScoredProgram};
pub use traits::{
    BehavioralScorer, CompositeScorer, FeatureSelector, Instance, KnobSpec,
    OperatorSet, Optimizer, OptimizerError, Program, ProgramSpace,
    Representation, argument,
};
