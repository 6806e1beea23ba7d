//! Bounded LRU memo of final recommendation lists.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::content::UserPreferences;
use crate::fusion::FusionWeights;
use crate::index::Filters;

/// Everything that influences a recommendation list. Floats are keyed by
/// their bit patterns so the signature is hashable and exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    pub version: u64,
    /// Rating ledger generation the result was computed against.
    pub ratings: u64,
    pub query: String,
    pub user_id: Option<String>,
    pub preferences: Option<UserPreferences>,
    pub filters: Filters,
    pub num_recommendations: usize,
    diversity: u32,
    weights: Option<[u64; 4]>,
    pub explain: bool,
}

impl QuerySignature {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u64,
        query: String,
        user_id: Option<String>,
        preferences: Option<UserPreferences>,
        filters: Filters,
        num_recommendations: usize,
        diversity: f32,
        weights: Option<&FusionWeights>,
        explain: bool,
    ) -> Self {
        Self {
            version,
            ratings: 0,
            query,
            user_id,
            preferences,
            filters,
            num_recommendations,
            diversity: diversity.to_bits(),
            weights: weights.map(|w| {
                [w.knn.to_bits(), w.content.to_bits(), w.collaborative.to_bits(), w.popularity.to_bits()]
            }),
            explain,
        }
    }

    pub fn at_ratings(self, generation: u64) -> Self {
        Self { ratings: generation, ..self }
    }
}

pub struct ResultCache<V> {
    inner: Mutex<LruCache<QuerySignature, V>>,
}

impl<V: Clone> ResultCache<V> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, key: &QuerySignature) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: QuerySignature, value: V) {
        self.inner.lock().put(key, value);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}
