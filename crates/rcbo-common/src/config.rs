//! Estimator configuration
//!
//! The small set of numeric knobs the estimation engine consumes. All
//! calculators take this struct by parameter; there is no ambient session
//! state.

use serde::{Deserialize, Serialize};

/// Configuration for statistics and cost estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimatorConfig {
    /// Interpolation between fully-correlated (0.0) and fully-independent
    /// (1.0) combination of filter conjuncts.
    pub filter_conjunction_independence_factor: f64,

    /// Same interpolation for multiple equi-join clauses.
    pub join_multi_clause_independence_factor: f64,

    /// Assumed number of cluster nodes, used as the replication factor
    /// when costing replicated joins and broadcast exchanges.
    pub cluster_node_count: usize,
}

impl Default for CostEstimatorConfig {
    fn default() -> Self {
        Self {
            filter_conjunction_independence_factor: 0.75,
            join_multi_clause_independence_factor: 0.25,
            cluster_node_count: 1,
        }
    }
}

impl CostEstimatorConfig {
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RcboError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), crate::RcboError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every knob is inside its legal domain.
    pub fn validate(&self) -> Result<(), crate::RcboError> {
        if !(0.0..=1.0).contains(&self.filter_conjunction_independence_factor) {
            return Err(crate::RcboError::Config(format!(
                "filter_conjunction_independence_factor must be in [0, 1], got {}",
                self.filter_conjunction_independence_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.join_multi_clause_independence_factor) {
            return Err(crate::RcboError::Config(format!(
                "join_multi_clause_independence_factor must be in [0, 1], got {}",
                self.join_multi_clause_independence_factor
            )));
        }
        if self.cluster_node_count == 0 {
            return Err(crate::RcboError::Config(
                "cluster_node_count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        CostEstimatorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_factor() {
        let config = CostEstimatorConfig {
            filter_conjunction_independence_factor: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_node_count() {
        let config = CostEstimatorConfig {
            cluster_node_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CostEstimatorConfig {
            filter_conjunction_independence_factor: 0.5,
            join_multi_clause_independence_factor: 0.0,
            cluster_node_count: 8,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: CostEstimatorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.cluster_node_count, 8);
        assert_eq!(parsed.join_multi_clause_independence_factor, 0.0);
    }
}
