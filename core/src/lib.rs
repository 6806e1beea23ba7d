//! Hybrid recipe recommendation: ingredient normalization and matching,
//! a KNN vector index over the corpus, and fusion with content,
//! collaborative and popularity signals.

pub mod cache;
pub mod collaborative;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod features;
pub mod fusion;
pub mod importance;
pub mod index;
pub mod knn;
pub mod ledger;
pub mod matcher;
pub mod normalize;
pub mod popularity;
pub mod recipe;
pub mod svd;
pub mod vectorizer;

pub use config::EngineConfig;
pub use content::UserPreferences;
pub use engine::{
    IndexStats, LedgerLoadReport, Query, RankedRecipe, RecommendRequest, RecommendationEngine, Recommendations,
    ReloadReport,
};
pub use error::{EngineError, Result};
pub use fusion::{FusionWeights, ScoredCandidate, Source};
pub use index::{Filters, KnnCandidate, KnnOptions};
pub use knn::Metric;
pub use ledger::RatingEntry;
pub use matcher::MatchedIngredients;
pub use normalize::Normalizer;
pub use popularity::PopularityStats;
pub use recipe::{Difficulty, Recipe, RecipeId, RecipeRecord};
