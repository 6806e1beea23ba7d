//! Immutable, versioned snapshot of an indexed recipe corpus.
//!
//! A `RecipeIndex` is built in one blocking pass and never mutated
//! afterwards; the engine swaps whole snapshots behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::content::{ContentHit, ContentModel, UserPreferences};
use crate::error::{EngineError, Result};
use crate::features::{query_features, recipe_features, FEATURE_WIDTH};
use crate::importance::{IngredientEntry, ImportanceTable};
use crate::knn::{similarity, Metric, NearestNeighbors};
use crate::matcher::{FuzzyMatcher, MatchedIngredients};
use crate::normalize::Normalizer;
use crate::recipe::{Recipe, RecipeId};
use crate::svd::TruncatedSvd;
use crate::vectorizer::{SparseVector, TfidfParams, TfidfVectorizer};

const SIMILARITY_WEIGHT: f32 = 0.6;
const INGREDIENT_WEIGHT: f32 = 0.4;
const COMMON_MATCH_SCORE: f64 = 0.3;
const MULTI_MATCH_BONUS: f64 = 0.2;
const LOW_COVERAGE_RATIO: f64 = 0.3;
const LOW_COVERAGE_PENALTY: f64 = 0.5;
const TOP_IMPORTANCE: usize = 15;
const BOTTOM_IMPORTANCE: usize = 10;

/// Hard constraints on retrieved recipes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Case-insensitive substring of the recipe's cuisine.
    pub cuisine: Option<String>,
    pub max_prep_minutes: Option<u32>,
}

impl Filters {
    pub fn admits(&self, recipe: &Recipe) -> bool {
        if let Some(cuisine) = &self.cuisine {
            if !recipe.cuisine.to_lowercase().contains(&cuisine.trim().to_lowercase()) {
                return false;
            }
        }
        if let Some(max) = self.max_prep_minutes {
            if recipe.prep_minutes > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnnOptions {
    pub num_recommendations: usize,
    /// Diversity coefficient in [0, 1]; 0 leaves the ranking untouched.
    pub diversity: f32,
    pub filters: Filters,
}

/// One retrieved recipe and everything that went into its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnnCandidate {
    pub recipe: Recipe,
    pub score: f32,
    pub distance: f32,
    pub similarity: f32,
    pub ingredient_score: f32,
    pub diversity_penalty: f32,
    pub important_matched: Vec<String>,
    pub common_matched: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportanceExtreme {
    pub name: String,
    pub importance: f64,
    pub recipes: usize,
}

impl From<&IngredientEntry> for ImportanceExtreme {
    fn from(entry: &IngredientEntry) -> Self {
        Self { name: entry.name.clone(), importance: entry.importance, recipes: entry.recipes.len() }
    }
}

#[derive(Debug)]
pub struct RecipeIndex {
    version: u64,
    k: usize,
    fuzzy_threshold: f32,
    normalizer: Normalizer,
    recipes: Vec<Recipe>,
    positions: HashMap<RecipeId, usize>,
    /// Canonical ingredient names per recipe, deduplicated, in recipe order.
    canonical: Vec<Vec<String>>,
    /// Lowercased raw ingredient lines per recipe.
    lowered: Vec<Vec<String>>,
    importance: ImportanceTable,
    vectorizer: TfidfVectorizer,
    tfidf_width: usize,
    svd: Option<TruncatedSvd>,
    neighbors: NearestNeighbors,
    content: ContentModel,
}

/// Repetitions of an ingredient in a recipe's weighted document.
fn corpus_repeats(importance: f64) -> usize {
    ((importance / 2.0).floor() as usize + 1).min(3)
}

/// Repetitions of an important ingredient in a query document.
fn query_repeats(importance: f64) -> usize {
    ((importance / 2.0).floor() as usize + 2).min(4)
}

fn repeat_into(doc: &mut Vec<String>, term: &str, times: usize) {
    doc.extend(std::iter::repeat(term.to_string()).take(times));
}

impl RecipeIndex {
    /// Full rebuild: importance, weighted vectors, optional projection,
    /// neighbor index and content model.
    pub fn build(recipes: Vec<Recipe>, config: &EngineConfig, metric: Metric, version: u64) -> Result<Self> {
        if recipes.is_empty() {
            return Err(EngineError::EmptyCorpus);
        }
        let started = Instant::now();
        let normalizer = Normalizer::new(config.use_stemming);

        // Categories are judged on the unstemmed form: "lentils" is a protein, "lentil" is not.
        let unstemmed = Normalizer::new(false);
        let labeled: Vec<Vec<(String, String)>> = recipes
            .iter()
            .map(|r| {
                let mut seen = HashSet::new();
                r.ingredients
                    .iter()
                    .map(|raw| (normalizer.normalize(raw), unstemmed.normalize(raw)))
                    .filter(|(c, _)| !c.is_empty() && seen.insert(c.clone()))
                    .collect()
            })
            .collect();
        let canonical: Vec<Vec<String>> =
            labeled.iter().map(|names| names.iter().map(|(c, _)| c.clone()).collect()).collect();
        let lowered: Vec<Vec<String>> = recipes
            .iter()
            .map(|r| r.ingredients.iter().map(|i| i.trim().to_lowercase()).collect())
            .collect();
        let importance = ImportanceTable::compute_labeled(&labeled);

        let documents: Vec<String> = canonical
            .iter()
            .map(|names| {
                let mut doc = Vec::new();
                for name in names {
                    repeat_into(&mut doc, name, corpus_repeats(importance.importance(name)));
                }
                doc.join(" ")
            })
            .collect();

        // Canonical names are already stemmed when stemming is on.
        let mut vectorizer = TfidfVectorizer::new(TfidfParams {
            ngram_range: config.vectorizer.ngram_range,
            max_features: config.vectorizer.max_features,
            min_df: config.vectorizer.min_df,
            max_df: config.vectorizer.max_df,
            stemming: false,
        });
        let tfidf_rows = vectorizer.fit_transform(&documents);
        let tfidf_width = vectorizer.vocabulary_size();

        let combined: Vec<SparseVector> = tfidf_rows
            .iter()
            .zip(recipes.iter().zip(&canonical))
            .map(|(row, (recipe, names))| row.concat_dense(tfidf_width, &recipe_features(recipe, names, &importance)))
            .collect();
        let combined_width = tfidf_width + FEATURE_WIDTH;

        let (vectors, width, svd) = if combined_width > config.reduction.trigger_width {
            let svd = TruncatedSvd::fit(
                &combined,
                combined_width,
                config.reduction.components,
                config.reduction.power_iterations,
                config.reduction.seed,
            )?;
            let reduced = combined.iter().map(|v| svd.transform(v)).collect::<Result<Vec<_>>>()?;
            let width = svd.output_width();
            (reduced, width, Some(svd))
        } else {
            (combined, combined_width, None)
        };
        let neighbors = NearestNeighbors::fit(vectors, width, metric)?;
        let content = ContentModel::fit(&recipes, config.content.max_features, config.use_stemming);

        let mut positions = HashMap::with_capacity(recipes.len());
        for (i, r) in recipes.iter().enumerate() {
            positions.entry(r.id.clone()).or_insert(i);
        }

        let index = Self {
            version,
            k: config.k,
            fuzzy_threshold: config.fuzzy_threshold,
            normalizer,
            recipes,
            positions,
            canonical,
            lowered,
            importance,
            vectorizer,
            tfidf_width,
            svd,
            neighbors,
            content,
        };
        info!(
            version,
            recipes = index.recipes.len(),
            ingredients = index.importance.len(),
            tfidf_width,
            vector_width = width,
            reduced = index.svd.is_some(),
            metric = %metric,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recipe index built"
        );
        for entry in index.importance.ranked().iter().take(TOP_IMPORTANCE) {
            debug!(ingredient = %entry.name, importance = entry.importance, recipes = entry.recipes.len(), "high importance");
        }
        Ok(index)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.positions.get(id).map(|&i| &self.recipes[i])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn importance(&self) -> &ImportanceTable {
        &self.importance
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.importance.names().map(String::from).collect()
    }

    pub fn tfidf_width(&self) -> usize {
        self.tfidf_width
    }

    pub fn vector_width(&self) -> usize {
        self.neighbors.width()
    }

    pub fn is_reduced(&self) -> bool {
        self.svd.is_some()
    }

    pub fn metric(&self) -> Metric {
        self.neighbors.metric()
    }

    pub fn content_vocabulary_size(&self) -> usize {
        self.content.vocabulary_size()
    }

    pub fn importance_extremes(&self) -> (Vec<ImportanceExtreme>, Vec<ImportanceExtreme>) {
        let ranked = self.importance.ranked();
        let top = ranked.iter().take(TOP_IMPORTANCE).map(|e| ImportanceExtreme::from(*e)).collect();
        let bottom = ranked.iter().rev().take(BOTTOM_IMPORTANCE).map(|e| ImportanceExtreme::from(*e)).collect();
        (top, bottom)
    }

    pub fn matcher(&self) -> FuzzyMatcher<'_> {
        FuzzyMatcher::new(&self.importance, self.normalizer, self.fuzzy_threshold)
    }

    /// Number of neighbors fetched before filtering and re-ranking.
    pub fn neighbor_pool(&self, num_recommendations: usize) -> usize {
        (self.k.max(num_recommendations) * 3).min(self.recipes.len())
    }

    fn query_vector(&self, matched: &MatchedIngredients) -> Result<SparseVector> {
        let mut doc = Vec::new();
        for name in &matched.important {
            repeat_into(&mut doc, name, query_repeats(self.importance.importance(name)));
        }
        for name in &matched.common {
            repeat_into(&mut doc, name, 1);
        }
        let tfidf = self.vectorizer.transform(&doc.join(" "));
        if tfidf.is_empty() {
            return Err(EngineError::OutOfVocabulary);
        }
        let combined = tfidf.concat_dense(self.tfidf_width, &query_features());
        match &self.svd {
            Some(svd) => svd.transform(&combined),
            None => Ok(combined),
        }
    }

    fn recipe_mentions(&self, position: usize, name: &str) -> bool {
        self.lowered[position].iter().chain(&self.canonical[position]).any(|i| i.contains(name))
    }

    /// Importance-weighted overlap between the query and one recipe, in [0, 1].
    fn ingredient_score(&self, position: usize, matched: &MatchedIngredients) -> (f32, Vec<String>, Vec<String>) {
        let important: Vec<String> =
            matched.important.iter().filter(|n| self.recipe_mentions(position, n)).cloned().collect();
        let common: Vec<String> =
            matched.common.iter().filter(|n| self.recipe_mentions(position, n)).cloned().collect();

        let mut important_score: f64 = important.iter().map(|n| self.importance.importance(n)).sum();
        if important.len() > 1 {
            important_score *= 1.0 + MULTI_MATCH_BONUS * (important.len() - 1) as f64;
        }
        let common_score = COMMON_MATCH_SCORE * common.len() as f64;

        let total = self.lowered[position].len();
        let ratio = if total == 0 { 1.0 } else { (important.len() + common.len()) as f64 / total as f64 };
        let penalty = if ratio < LOW_COVERAGE_RATIO { LOW_COVERAGE_PENALTY } else { 1.0 };
        let score = ((important_score + common_score) * penalty / 10.0).min(1.0);
        (score as f32, important, common)
    }

    /// KNN retrieval with ingredient scoring, filters and diversity re-ranking.
    pub fn knn(&self, matched: &MatchedIngredients, options: &KnnOptions) -> Result<Vec<KnnCandidate>> {
        if matched.is_empty() || options.num_recommendations == 0 {
            return Ok(Vec::new());
        }
        let query = self.query_vector(matched)?;
        let hits = self.neighbors.kneighbors(&query, self.neighbor_pool(options.num_recommendations))?;

        let mut scored: Vec<KnnCandidate> = Vec::with_capacity(hits.len());
        let mut positions: Vec<usize> = Vec::with_capacity(hits.len());
        for hit in hits {
            let recipe = &self.recipes[hit.index];
            if !options.filters.admits(recipe) {
                continue;
            }
            let sim = similarity(hit.distance);
            let (ingredient_score, important_matched, common_matched) = self.ingredient_score(hit.index, matched);
            scored.push(KnnCandidate {
                recipe: recipe.clone(),
                score: SIMILARITY_WEIGHT * sim + INGREDIENT_WEIGHT * ingredient_score,
                distance: hit.distance,
                similarity: sim,
                ingredient_score,
                diversity_penalty: 0.0,
                important_matched,
                common_matched,
            });
            positions.push(hit.index);
        }

        let mut order: Vec<usize> = (0..scored.len()).collect();
        order.sort_by(|&a, &b| scored[b].score.total_cmp(&scored[a].score).then(positions[a].cmp(&positions[b])));
        let mut ranked: Vec<(usize, KnnCandidate)> = order.into_iter().map(|i| (positions[i], scored[i].clone())).collect();

        if options.diversity > 0.0 {
            let sets: Vec<HashSet<&str>> =
                ranked.iter().map(|(p, _)| self.lowered[*p].iter().map(String::as_str).collect()).collect();
            apply_diversity(&mut ranked, &sets, options.diversity);
            ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
        }
        ranked.truncate(options.num_recommendations);
        debug!(
            important = ?matched.important,
            common = ?matched.common,
            returned = ranked.len(),
            "knn retrieval"
        );
        Ok(ranked.into_iter().map(|(_, c)| c).collect())
    }

    /// Content-similarity scores for a query text.
    pub fn content_scores(&self, query: &str, preferences: Option<&UserPreferences>, n: usize) -> Vec<ContentHit> {
        self.content.score(query, &self.recipes, preferences, n)
    }
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Penalize each candidate by its overlap with every higher-ranked one,
/// weighting the overlap with rank `j` by `1 / (j + 1)`. `ranked` must be in
/// descending score order; scores are adjusted in place.
fn apply_diversity(ranked: &mut [(usize, KnnCandidate)], sets: &[HashSet<&str>], coefficient: f32) {
    for i in 1..ranked.len() {
        let mut penalty = 0.0f32;
        for j in 0..i {
            penalty += jaccard(&sets[i], &sets[j]) * coefficient / (j + 1) as f32;
        }
        let penalty = penalty.clamp(0.0, 1.0);
        let candidate = &mut ranked[i].1;
        candidate.diversity_penalty = penalty;
        candidate.score *= 1.0 - penalty;
    }
}
