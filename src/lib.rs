//! Metapopulation search for symbolic programs.
//!
//! This crate learns programs - expression trees over a fixed operator
//! alphabet - that best fit a scoring function. It keeps a bounded pool
//! of scored candidates (the *metapopulation*), repeatedly selects one
//! as an *exemplar*, builds a knob representation around it, optimizes
//! that neighborhood (the *deme*) and merges the promising variants
//! back, under Pareto domination and size pressure.
//!
//! # Architecture
//!
//! The crate is split into four modules:
//!
//! - `schema`: configuration types for a search run
//! - `search`: the metapopulation engine and its capability contracts
//! - `expr`: a bundled arithmetic expression-tree program space
//! - `optimize`: a bundled hill-climbing inner optimizer
//!
//! The engine is generic over its program space, scorers and optimizer;
//! `expr` and `optimize` provide the reference implementations used by
//! the CLI and the test suite.
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
//! // Fit y = 2x + 1.
//! let dataset = Arc::new(Dataset {
//!     rows: (-5..=5).map(|x| vec![x as f64]).collect(),
//!     targets: (-5..=5).map(|x| 2.0 * x as f64 + 1.0).collect(),
//! });
//!
//! let config = SearchConfig {
//!     random_seed: Some(42),
//!     ..SearchConfig::default()
//! };
//!
//! let mut engine = Metapopulation::new(
//!     ExprSpace::new(dataset.arity()),
//!     RegressionScorer::new(Arc::clone(&dataset)),
//!     RegressionBscorer::new(Arc::clone(&dataset), 0.0),
//!     HillClimber::new(42),
//!     vec![Expr::Add(Box::new(Expr::Var(0)), Box::new(Expr::Num(0.5)))],
//!     config,
//! )
//! .unwrap();
//!
//! let result = engine.run(50_000);
//! println!("best score: {}", result.best_score);
//! ```

pub mod expr;
pub mod optimize;
pub mod schema;
pub mod search;

// Re-export commonly used types
pub use optimize::HillClimber;
pub use schema::{ConfigError, SearchConfig};
pub use search::{Metapopulation, SearchResult, StopReason};
