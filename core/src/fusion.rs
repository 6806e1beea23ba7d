//! Rank-normalized weighted fusion of the four scorers.
//!
//! Each source's list is converted to `max(0, 1 - i / len)` by position,
//! throwing away the source's own score scale so the weights alone decide
//! how much each source counts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::recipe::{Recipe, RecipeId};

pub const WEIGHT_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Knn,
    Content,
    Collaborative,
    Popularity,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Knn, Source::Content, Source::Collaborative, Source::Popularity];
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Knn => "knn",
            Source::Content => "content",
            Source::Collaborative => "collaborative",
            Source::Popularity => "popularity",
        };
        f.write_str(s)
    }
}

/// Static fusion weights. They must sum to 1.0 within `WEIGHT_TOLERANCE`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub knn: f64,
    pub content: f64,
    pub collaborative: f64,
    pub popularity: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { knn: 0.5, content: 0.25, collaborative: 0.15, popularity: 0.1 }
    }
}

impl FusionWeights {
    pub fn new(knn: f64, content: f64, collaborative: f64, popularity: f64) -> Result<Self> {
        let weights = Self { knn, content, collaborative, popularity };
        weights.validate()?;
        Ok(weights)
    }

    pub fn get(&self, source: Source) -> f64 {
        match source {
            Source::Knn => self.knn,
            Source::Content => self.content,
            Source::Collaborative => self.collaborative,
            Source::Popularity => self.popularity,
        }
    }

    pub fn sum(&self) -> f64 {
        Source::ALL.iter().map(|s| self.get(*s)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        for source in Source::ALL {
            let w = self.get(source);
            if !(0.0..=1.0).contains(&w) {
                return Err(EngineError::Configuration(format!("{source} weight {w} is outside [0, 1]")));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EngineError::Configuration(format!("fusion weights sum to {sum:.4}, expected 1.0")));
        }
        Ok(())
    }
}

/// Normalized score for 0-based rank `i` in a list of `len` entries.
pub fn rank_score(i: usize, len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    (1.0 - i as f64 / len as f64).max(0.0)
}

/// Per-source normalized scores of one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SourceScores {
    pub knn: f64,
    pub content: f64,
    pub collaborative: f64,
    pub popularity: f64,
}

impl SourceScores {
    fn set(&mut self, source: Source, value: f64) {
        match source {
            Source::Knn => self.knn = value,
            Source::Content => self.content = value,
            Source::Collaborative => self.collaborative = value,
            Source::Popularity => self.popularity = value,
        }
    }

    pub fn weighted(&self, weights: &FusionWeights) -> f64 {
        self.knn * weights.knn
            + self.content * weights.content
            + self.collaborative * weights.collaborative
            + self.popularity * weights.popularity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub sources: Vec<Source>,
    pub scores: SourceScores,
    pub weights: FusionWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub recipe: Recipe,
    pub score: f64,
    pub scores: SourceScores,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// A fused entry before the recipe record is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEntry {
    pub recipe_id: RecipeId,
    pub score: f64,
    pub scores: SourceScores,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fusion {
    pub ranked: Vec<FusedEntry>,
    /// Sources that failed and contributed nothing.
    pub degraded: Vec<Source>,
}

/// Fuse ranked id lists. A failed source contributes zero and is reported
/// in `degraded`; it never aborts the fusion. Ties keep first-seen order.
pub fn fuse(lists: Vec<(Source, Result<Vec<RecipeId>>)>, weights: &FusionWeights) -> Fusion {
    let mut entries: Vec<FusedEntry> = Vec::new();
    let mut slots: HashMap<RecipeId, usize> = HashMap::new();
    let mut degraded = Vec::new();

    for (source, result) in lists {
        let ids = match result {
            Ok(ids) => ids,
            Err(err) => {
                warn!(source = %source, error = %err, "source failed, contributing zero");
                degraded.push(source);
                continue;
            }
        };
        let len = ids.len();
        for (i, id) in ids.into_iter().enumerate() {
            let slot = *slots.entry(id.clone()).or_insert_with(|| {
                entries.push(FusedEntry { recipe_id: id, score: 0.0, scores: SourceScores::default(), sources: Vec::new() });
                entries.len() - 1
            });
            let entry = &mut entries[slot];
            if entry.sources.contains(&source) {
                continue;
            }
            entry.scores.set(source, rank_score(i, len));
            entry.sources.push(source);
        }
    }

    for entry in entries.iter_mut() {
        entry.score = entry.scores.weighted(weights);
    }
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    Fusion { ranked: entries, degraded }
}
