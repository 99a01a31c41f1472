//! Configuration for hybrid retrieval.

use serde::{Deserialize, Serialize};

/// Tuning for tiered vector search and graph expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum number of hits kept below the high-confidence tier.
    pub limit: usize,
    /// Hits scoring below this are discarded.
    pub low_threshold: f32,
    /// Hits scoring at or above this are always kept.
    pub high_threshold: f32,
    /// Candidate pool size is `limit * candidate_multiplier`.
    pub candidate_multiplier: usize,
    /// Graph expansion depth around the retrieved entities.
    pub hops: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            low_threshold: 0.5,
            high_threshold: 0.8,
            candidate_multiplier: 10,
            hops: 1,
        }
    }
}

impl RetrievalConfig {
    /// Number of candidates to request from the vector store.
    pub fn candidate_pool(&self) -> usize {
        self.limit.saturating_mul(self.candidate_multiplier)
    }

    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.limit == 0 {
            return Err("limit must be at least 1");
        }
        if self.candidate_multiplier < 10 {
            return Err("candidate_multiplier must be at least 10");
        }
        if !(-1.0..=1.0).contains(&self.low_threshold) {
            return Err("low_threshold must be between -1.0 and 1.0");
        }
        if !(-1.0..=1.0).contains(&self.high_threshold) {
            return Err("high_threshold must be between -1.0 and 1.0");
        }
        if self.low_threshold > self.high_threshold {
            return Err("low_threshold must not exceed high_threshold");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.limit, 10);
        assert_eq!(config.hops, 1);
        assert_eq!(config.candidate_pool(), 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let inverted = RetrievalConfig {
            low_threshold: 0.9,
            high_threshold: 0.5,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let small_pool = RetrievalConfig {
            candidate_multiplier: 3,
            ..Default::default()
        };
        assert!(small_pool.validate().is_err());

        let zero_limit = RetrievalConfig {
            limit: 0,
            ..Default::default()
        };
        assert!(zero_limit.validate().is_err());
    }
}
