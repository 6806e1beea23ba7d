//! Caller-facing recommendation engine.
//!
//! The live index is an immutable `Arc<RecipeIndex>` behind a short-lived
//! read lock. A reload builds the next snapshot outside that lock, under a
//! separate rebuild mutex, and swaps it in with one brief write. Queries
//! that started on the old snapshot finish on it.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{QuerySignature, ResultCache};
use crate::collaborative::CollaborativeScorer;
use crate::config::EngineConfig;
use crate::content::UserPreferences;
use crate::error::{EngineError, Result};
use crate::fusion::{fuse, Explanation, FusionWeights, ScoredCandidate, Source};
use crate::index::{Filters, ImportanceExtreme, KnnCandidate, KnnOptions, RecipeIndex};
use crate::knn::Metric;
use crate::ledger::{validate_rating, RatingEntry, RatingLedger};
use crate::matcher::{split_query, MatchedIngredients};
use crate::popularity::{PopularityStats, PopularityTracker};
use crate::recipe::{Recipe, RecipeRecord};

/// What the user has on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Query {
    /// Comma-separated free text.
    Text(String),
    Ingredients(Vec<String>),
}

impl Query {
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Query::Text(text) => split_query(text),
            Query::Ingredients(items) => {
                items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from).collect()
            }
        }
    }

    /// Single-string form, used by the content scorer and as the cache key.
    pub fn text(&self) -> String {
        match self {
            Query::Text(text) => text.trim().to_string(),
            Query::Ingredients(_) => self.tokens().join(", "),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Text(text)
    }
}

impl From<Vec<String>> for Query {
    fn from(items: Vec<String>) -> Self {
        Query::Ingredients(items)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    pub query: Query,
    pub user_id: Option<String>,
    pub preferences: Option<UserPreferences>,
    pub filters: Filters,
    /// Defaults to the configured `k`.
    pub num_recommendations: Option<usize>,
    /// Defaults to the configured diversity; clamped to [0, 1].
    pub diversity: Option<f32>,
    pub weights: Option<FusionWeights>,
    pub explain: bool,
}

impl RecommendRequest {
    pub fn new(query: impl Into<Query>) -> Self {
        Self {
            query: query.into(),
            user_id: None,
            preferences: None,
            filters: Filters::default(),
            num_recommendations: None,
            diversity: None,
            weights: None,
            explain: false,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.num_recommendations = Some(n);
        self
    }

    pub fn with_diversity(mut self, diversity: f32) -> Self {
        self.diversity = Some(diversity);
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn explained(mut self) -> Self {
        self.explain = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendations {
    pub candidates: Vec<ScoredCandidate>,
    pub matched: MatchedIngredients,
    /// Why the list is empty or shorter than requested, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded_sources: Vec<Source>,
    pub index_version: u64,
}

impl Recommendations {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.recipe.id.as_str()).collect()
    }
}

/// A recipe with the native score of a single scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecipe {
    pub recipe: Recipe,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadReport {
    pub version: u64,
    pub loaded: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub ingredients: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerLoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub users: usize,
    pub rated_recipes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub version: u64,
    pub recipes: usize,
    pub ingredients: usize,
    pub tfidf_width: usize,
    pub vector_width: usize,
    pub reduced: bool,
    pub metric: Metric,
    pub content_vocabulary: usize,
    pub most_important: Vec<ImportanceExtreme>,
    pub least_important: Vec<ImportanceExtreme>,
    pub ratings: usize,
    pub rated_recipes: usize,
    pub cached_results: usize,
}

#[derive(Debug, Default)]
struct RatingState {
    ledger: RatingLedger,
    popularity: PopularityTracker,
    /// Bumped by every committed change; part of each cache key.
    generation: u64,
}

pub struct RecommendationEngine {
    config: EngineConfig,
    metric: Metric,
    index: RwLock<Option<Arc<RecipeIndex>>>,
    rebuild: Mutex<()>,
    version: AtomicU64,
    ratings: RwLock<RatingState>,
    cache: ResultCache<Recommendations>,
}

fn source_error(scorer: Source, err: EngineError) -> EngineError {
    EngineError::Source { scorer, reason: err.to_string() }
}

impl RecommendationEngine {
    /// Validates the configuration; the engine starts without an index.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let metric = config.validate()?;
        info!(metric = %metric, k = config.k, cache_capacity = config.cache_capacity, "recommendation engine configured");
        Ok(Self {
            cache: ResultCache::new(config.cache_capacity),
            config,
            metric,
            index: RwLock::new(None),
            rebuild: Mutex::new(()),
            version: AtomicU64::new(0),
            ratings: RwLock::new(RatingState::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.index.read().is_some()
    }

    fn snapshot(&self) -> Result<Arc<RecipeIndex>> {
        self.index.read().clone().ok_or(EngineError::NotReady)
    }

    /// Validate, rebuild and swap in a new index. Malformed and duplicate
    /// records are skipped. With no valid record at all the previous index
    /// stays live and `EmptyCorpus` is returned.
    pub fn reload_corpus<I, R>(&self, records: I) -> Result<ReloadReport>
    where
        I: IntoIterator<Item = R>,
        R: Into<RecipeRecord>,
    {
        let _rebuild = self.rebuild.lock();
        let started = Instant::now();

        let mut recipes = Vec::new();
        let mut seen = HashSet::new();
        let (mut skipped, mut duplicates) = (0, 0);
        for record in records {
            let record: RecipeRecord = record.into();
            match record.validate() {
                Ok(recipe) if seen.contains(&recipe.id) => {
                    warn!(id = %recipe.id, "duplicate recipe id, keeping the first");
                    duplicates += 1;
                }
                Ok(recipe) => {
                    seen.insert(recipe.id.clone());
                    recipes.push(recipe);
                }
                Err(reason) => {
                    warn!(%reason, "skipping malformed recipe record");
                    skipped += 1;
                }
            }
        }
        if recipes.is_empty() {
            warn!(skipped, duplicates, "reload produced no valid recipes, keeping the current index");
            return Err(EngineError::EmptyCorpus);
        }

        let version = self.version.load(Ordering::SeqCst) + 1;
        let index = RecipeIndex::build(recipes, &self.config, self.metric, version)?;
        let report = ReloadReport {
            version,
            loaded: index.len(),
            skipped,
            duplicates,
            ingredients: index.importance().len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        *self.index.write() = Some(Arc::new(index));
        self.version.store(version, Ordering::SeqCst);
        self.cache.clear();
        info!(
            version,
            loaded = report.loaded,
            skipped,
            duplicates,
            elapsed_ms = report.elapsed_ms,
            "corpus reloaded"
        );
        Ok(report)
    }

    /// Bulk import of ratings. Invalid entries are skipped; popularity is
    /// recomputed from the whole ledger afterwards.
    pub fn load_ratings<I>(&self, entries: I) -> LedgerLoadReport
    where
        I: IntoIterator<Item = RatingEntry>,
    {
        let mut state = self.ratings.write();
        let (mut loaded, mut skipped) = (0, 0);
        for entry in entries {
            match validate_rating(&entry.user_id, &entry.recipe_id, entry.rating) {
                Ok(rating) => {
                    state.ledger.record(&entry.user_id, &entry.recipe_id, rating);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(error = %err, "skipping rating");
                    skipped += 1;
                }
            }
        }
        state.popularity = PopularityTracker::from_ledger(&state.ledger);
        state.generation += 1;
        let report = LedgerLoadReport {
            loaded,
            skipped,
            users: state.ledger.user_count(),
            rated_recipes: state.popularity.rated_recipes(),
        };
        drop(state);
        self.cache.clear();
        info!(loaded, skipped, users = report.users, "rating ledger loaded");
        report
    }

    /// Insert or replace one rating. Out-of-range ratings are rejected
    /// before any state is touched.
    pub fn record_rating(&self, user_id: &str, recipe_id: &str, rating: i64) -> Result<()> {
        let rating = validate_rating(user_id, recipe_id, rating)?;
        {
            let mut state = self.ratings.write();
            let previous = state.ledger.record(user_id, recipe_id, rating);
            state.popularity.apply(recipe_id, previous, rating);
            state.generation += 1;
        }
        self.cache.clear();
        debug!(user = user_id, recipe = recipe_id, rating, "rating recorded");
        Ok(())
    }

    pub fn match_ingredients(&self, text: &str) -> Result<MatchedIngredients> {
        let index = self.snapshot()?;
        let matched = index.matcher().match_text(text);
        Ok(matched)
    }

    fn match_query(index: &RecipeIndex, query: &Query) -> MatchedIngredients {
        index.matcher().match_tokens(&query.tokens())
    }

    /// The KNN retrieval path on its own.
    pub fn recommend_knn(&self, query: &Query, options: &KnnOptions) -> Result<Vec<KnnCandidate>> {
        let index = self.snapshot()?;
        let matched = Self::match_query(&index, query);
        index.knn(&matched, options)
    }

    pub fn content_recommendations(
        &self,
        query: &Query,
        preferences: Option<&UserPreferences>,
        n: usize,
    ) -> Result<Vec<RankedRecipe>> {
        let index = self.snapshot()?;
        Ok(index
            .content_scores(&query.text(), preferences, n)
            .into_iter()
            .map(|hit| RankedRecipe { recipe: index.recipes()[hit.position].clone(), score: hit.score as f64 })
            .collect())
    }

    /// Collaborative scores for `user_id`; a user without ratings gets the
    /// popularity ranking instead.
    pub fn collaborative_recommendations(&self, user_id: &str, n: usize) -> Result<Vec<RankedRecipe>> {
        let index = self.snapshot()?;
        let state = self.ratings.read();
        Ok(self.collaborative_for(&index, &state, user_id, n))
    }

    fn collaborative_for(&self, index: &RecipeIndex, state: &RatingState, user_id: &str, n: usize) -> Vec<RankedRecipe> {
        if !state.ledger.has_ratings(user_id) {
            debug!(user = user_id, "no ratings, falling back to popularity");
            return Self::popular_in(index, &state.popularity, n);
        }
        CollaborativeScorer::new(&state.ledger, &self.config.collaborative)
            .recommend(user_id, n, |id| index.contains(id))
            .into_iter()
            .filter_map(|(id, score)| index.recipe(&id).map(|r| RankedRecipe { recipe: r.clone(), score }))
            .collect()
    }

    pub fn popular_recipes(&self, n: usize) -> Result<Vec<RankedRecipe>> {
        let index = self.snapshot()?;
        let state = self.ratings.read();
        Ok(Self::popular_in(&index, &state.popularity, n))
    }

    fn popular_in(index: &RecipeIndex, popularity: &PopularityTracker, n: usize) -> Vec<RankedRecipe> {
        let ids: Vec<String> = index.recipes().iter().map(|r| r.id.clone()).collect();
        popularity
            .ranked(&ids)
            .into_iter()
            .take(n)
            .map(|(i, score)| RankedRecipe { recipe: index.recipes()[i].clone(), score })
            .collect()
    }

    /// Hybrid recommendation. Fails only when no index is loaded or the
    /// weights override is invalid; every other problem yields a possibly
    /// empty list with a diagnostic.
    pub fn recommend(&self, request: &RecommendRequest) -> Result<Recommendations> {
        let index = self.snapshot()?;
        if let Some(weights) = &request.weights {
            weights.validate()?;
        }
        let weights = request.weights.unwrap_or(self.config.weights);
        let num = request.num_recommendations.unwrap_or(self.config.k);
        let diversity = match request.diversity {
            Some(d) if d.is_finite() => d.clamp(0.0, 1.0),
            _ => self.config.diversity.clamp(0.0, 1.0),
        };

        let signature = QuerySignature::new(
            index.version(),
            request.query.text().to_lowercase(),
            request.user_id.clone(),
            request.preferences.clone(),
            request.filters.clone(),
            num,
            diversity,
            request.weights.as_ref(),
            request.explain,
        )
        .at_ratings(self.ratings.read().generation);
        if let Some(hit) = self.cache.get(&signature) {
            debug!(query = %signature.query, "recommendation cache hit");
            return Ok(hit);
        }

        let started = Instant::now();
        let matched = Self::match_query(&index, &request.query);
        let mut out = Recommendations { matched, index_version: index.version(), ..Recommendations::default() };
        if out.matched.is_empty() {
            out.diagnostic = Some("no query ingredient matched a known ingredient".into());
            self.cache.put(signature, out.clone());
            return Ok(out);
        }
        if num == 0 {
            out.diagnostic = Some("zero recommendations requested".into());
            self.cache.put(signature, out.clone());
            return Ok(out);
        }

        let pool = num * 2;
        let filters = &request.filters;
        let admitted = |r: &Recipe| filters.admits(r);

        let knn: Result<Vec<String>> = index
            .knn(&out.matched, &KnnOptions { num_recommendations: pool, diversity, filters: filters.clone() })
            .map(|hits| hits.into_iter().map(|h| h.recipe.id).collect())
            .map_err(|e| source_error(Source::Knn, e));
        let content: Result<Vec<String>> = Ok(index
            .content_scores(&request.query.text(), request.preferences.as_ref(), index.len())
            .into_iter()
            .map(|hit| &index.recipes()[hit.position])
            .filter(|r| admitted(r))
            .take(pool)
            .map(|r| r.id.clone())
            .collect());
        let mut lists = vec![(Source::Knn, knn), (Source::Content, content)];
        // Both rating-driven sources see one ledger state.
        let generation = {
            let state = self.ratings.read();
            let take_admitted = |ranked: Vec<RankedRecipe>| -> Vec<String> {
                ranked.into_iter().filter(|r| admitted(&r.recipe)).take(pool).map(|r| r.recipe.id).collect()
            };
            if let Some(user_id) = &request.user_id {
                let ids = take_admitted(self.collaborative_for(&index, &state, user_id, index.len()));
                lists.push((Source::Collaborative, Ok(ids)));
            }
            let popular = take_admitted(Self::popular_in(&index, &state.popularity, index.len()));
            lists.push((Source::Popularity, Ok(popular)));
            state.generation
        };

        let fusion = fuse(lists, &weights);
        out.degraded_sources = fusion.degraded;
        out.candidates = fusion
            .ranked
            .into_iter()
            .filter_map(|entry| {
                let recipe = index.recipe(&entry.recipe_id)?.clone();
                let explanation = request.explain.then(|| Explanation {
                    sources: entry.sources.clone(),
                    scores: entry.scores,
                    weights,
                });
                Some(ScoredCandidate { recipe, score: entry.score, scores: entry.scores, sources: entry.sources, explanation })
            })
            .take(num)
            .collect();
        if out.candidates.is_empty() {
            out.diagnostic = Some("no recipe satisfied the filters".into());
        }
        info!(
            query = %signature.query,
            returned = out.candidates.len(),
            degraded = out.degraded_sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hybrid recommendation"
        );
        // Keyed by the ledger state the lists were built from.
        self.cache.put(signature.at_ratings(generation), out.clone());
        Ok(out)
    }

    pub fn recipe(&self, id: &str) -> Option<Recipe> {
        self.index.read().as_ref()?.recipe(id).cloned()
    }

    /// Sorted ingredient vocabulary of the live index, empty before the first load.
    pub fn ingredient_names(&self) -> Vec<String> {
        self.index.read().as_ref().map(|i| i.ingredient_names()).unwrap_or_default()
    }

    pub fn popularity_of(&self, recipe_id: &str) -> Option<PopularityStats> {
        self.ratings.read().popularity.stats(recipe_id)
    }

    pub fn stats(&self) -> Option<IndexStats> {
        let index = self.snapshot().ok()?;
        let (most_important, least_important) = index.importance_extremes();
        let state = self.ratings.read();
        Some(IndexStats {
            version: index.version(),
            recipes: index.len(),
            ingredients: index.importance().len(),
            tfidf_width: index.tfidf_width(),
            vector_width: index.vector_width(),
            reduced: index.is_reduced(),
            metric: index.metric(),
            content_vocabulary: index.content_vocabulary_size(),
            most_important,
            least_important,
            ratings: state.ledger.len(),
            rated_recipes: state.popularity.rated_recipes(),
            cached_results: self.cache.len(),
        })
    }
}
