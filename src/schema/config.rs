//! Configuration types for the metapopulation search.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Canonical operator names excluded from knob building. Argument
/// operators are spelled `$1`, `$2`, ...
pub type OperatorSet = BTreeSet<String>;

/// Top-level knobs for a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Cap on candidates considered for merging per cycle.
    /// `None` keeps all of them.
    #[serde(default)]
    pub max_candidates: Option<usize>,
    /// Reduce candidate trees before evaluation.
    #[serde(default = "default_reduce_all")]
    pub reduce_all: bool,
    /// Clear the visited set once when every exemplar has been tried,
    /// allowing one more pass over the pool.
    #[serde(default)]
    pub revisit: bool,
    /// Keep behaviorally dominated candidates when merging. Keeping them
    /// avoids local maxima at the cost of a larger pool.
    #[serde(default = "default_include_dominated")]
    pub include_dominated: bool,
    /// Penalize exemplars behaviorally close to the previous one.
    #[serde(default)]
    pub use_diversity_penalty: bool,
    /// Boltzmann temperature for exemplar selection. Higher values widen
    /// the band of competitive candidates that get explored.
    #[serde(default = "default_complexity_temperature")]
    pub complexity_temperature: f64,
    /// Weight of complexity in the ranking score `s - d - k*c`.
    #[serde(default)]
    pub complexity_weight: f64,
    /// Operator names excluded from knob building.
    #[serde(default)]
    pub ignore_ops: OperatorSet,
    /// Worker threads for the parallel phases.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// RNG seed for reproducible runs.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_candidates: None,
            reduce_all: default_reduce_all(),
            revisit: false,
            include_dominated: default_include_dominated(),
            use_diversity_penalty: false,
            complexity_temperature: default_complexity_temperature(),
            complexity_weight: 0.0,
            ignore_ops: OperatorSet::new(),
            jobs: default_jobs(),
            random_seed: None,
        }
    }
}

fn default_reduce_all() -> bool {
    true
}
fn default_include_dominated() -> bool {
    true
}
fn default_complexity_temperature() -> f64 {
    3.0
}
fn default_jobs() -> usize {
    1
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("complexity temperature must be positive, got {0}")]
    InvalidTemperature(f64),
    #[error("complexity weight must be non-negative, got {0}")]
    InvalidComplexityWeight(f64),
    #[error("at least one worker thread is required")]
    InvalidJobs,
    #[error("candidate cap must be positive when set")]
    InvalidCandidateCap,
}

impl SearchConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.complexity_temperature > 0.0) {
            return Err(ConfigError::InvalidTemperature(
                self.complexity_temperature,
            ));
        }
        if !(self.complexity_weight >= 0.0) {
            return Err(ConfigError::InvalidComplexityWeight(
                self.complexity_weight,
            ));
        }
        if self.jobs == 0 {
            return Err(ConfigError::InvalidJobs);
        }
        if self.max_candidates == Some(0) {
            return Err(ConfigError::InvalidCandidateCap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.include_dominated);
        assert!(config.reduce_all);
        assert!(!config.revisit);
        assert_eq!(config.complexity_temperature, 3.0);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = SearchConfig {
            complexity_temperature: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemperature(_))
        ));

        config.complexity_temperature = 3.0;
        config.jobs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJobs)));

        config.jobs = 1;
        config.max_candidates = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCandidateCap)
        ));

        config.max_candidates = None;
        config.complexity_weight = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidComplexityWeight(_))
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = SearchConfig::default();
        config.ignore_ops.insert("$2".to_string());
        config.random_seed = Some(7);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ignore_ops, config.ignore_ops);
        assert_eq!(parsed.random_seed, Some(7));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: SearchConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.include_dominated);
        assert_eq!(parsed.complexity_temperature, 3.0);
        assert!(parsed.max_candidates.is_none());
    }
}
