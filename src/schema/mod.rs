//! Schema module - Configuration types for the search engine.

mod config;

pub use config::*;
