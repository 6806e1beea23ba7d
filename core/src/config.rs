use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::fusion::FusionWeights;
use crate::knn::Metric;

/// Engine tuning. Every field has a default so partial JSON files load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default number of recommendations and the base of the neighbor fetch size.
    pub k: usize,
    /// "cosine", "euclidean" or "manhattan".
    pub metric: String,
    pub use_stemming: bool,
    /// Default diversity coefficient for KNN re-ranking.
    pub diversity: f32,
    pub cache_capacity: usize,
    /// Minimum character-sequence ratio accepted by the fuzzy matcher.
    pub fuzzy_threshold: f32,
    pub weights: FusionWeights,
    pub vectorizer: VectorizerConfig,
    pub reduction: ReductionConfig,
    pub content: ContentConfig,
    pub collaborative: CollaborativeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k: 10,
            metric: "cosine".into(),
            use_stemming: false,
            diversity: 0.3,
            cache_capacity: 1000,
            fuzzy_threshold: 0.6,
            weights: FusionWeights::default(),
            vectorizer: VectorizerConfig::default(),
            reduction: ReductionConfig::default(),
            content: ContentConfig::default(),
            collaborative: CollaborativeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    pub ngram_range: (usize, usize),
    pub max_features: usize,
    /// Terms seen in fewer documents are dropped.
    pub min_df: usize,
    /// Terms seen in a larger fraction of documents are dropped.
    pub max_df: f32,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self { ngram_range: (1, 3), max_features: 8000, min_df: 2, max_df: 0.8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Combined width above which the truncated projection is fitted.
    pub trigger_width: usize,
    pub components: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self { trigger_width: 5000, components: 1000, power_iterations: 4, seed: 42 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub max_features: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self { max_features: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    /// Recipes two users must both have rated before they are compared.
    pub min_common: usize,
    pub min_correlation: f64,
    pub max_neighbors: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self { min_common: 2, min_correlation: 0.3, max_neighbors: 10 }
    }
}

impl EngineConfig {
    /// Check every value the engine relies on. Returns the parsed metric.
    pub fn validate(&self) -> Result<Metric> {
        let metric: Metric = self.metric.parse()?;
        self.weights.validate()?;
        if self.k == 0 {
            return Err(EngineError::Configuration("k must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::Configuration("cache_capacity must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(EngineError::Configuration(format!(
                "fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        let (lo, hi) = self.vectorizer.ngram_range;
        if lo == 0 || hi < lo {
            return Err(EngineError::Configuration(format!("invalid ngram_range ({lo}, {hi})")));
        }
        if !(self.vectorizer.max_df > 0.0 && self.vectorizer.max_df <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "max_df must be within (0, 1], got {}",
                self.vectorizer.max_df
            )));
        }
        if self.vectorizer.max_features == 0 || self.content.max_features == 0 {
            return Err(EngineError::Configuration("max_features must be at least 1".into()));
        }
        if self.reduction.components == 0 {
            return Err(EngineError::Configuration("reduction.components must be at least 1".into()));
        }
        Ok(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let metric = EngineConfig::default().validate().unwrap();
        assert_eq!(metric, Metric::Cosine);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"k": 4, "weights": {"knn": 0.7, "content": 0.1}}"#).unwrap();
        assert_eq!(cfg.k, 4);
        assert_eq!(cfg.vectorizer.max_features, 8000);
        assert!((cfg.weights.collaborative - 0.15).abs() < 1e-9);
        // 0.7 + 0.1 + 0.15 + 0.1 != 1.0
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let cfg = EngineConfig { metric: "hamming".into(), ..EngineConfig::default() };
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));
    }
}
