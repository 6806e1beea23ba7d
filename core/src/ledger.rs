use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::recipe::RecipeId;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// One rating as handed over by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    #[serde(alias = "userId", alias = "user")]
    pub user_id: String,
    #[serde(alias = "recipeId", alias = "recipe")]
    pub recipe_id: String,
    pub rating: i64,
}

impl RatingEntry {
    pub fn new(user_id: impl Into<String>, recipe_id: impl Into<String>, rating: i64) -> Self {
        Self { user_id: user_id.into(), recipe_id: recipe_id.into(), rating }
    }
}

/// Check a rating without touching any state.
pub fn validate_rating(user_id: &str, recipe_id: &str, rating: i64) -> Result<u8> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) || user_id.trim().is_empty() || recipe_id.trim().is_empty() {
        return Err(EngineError::InvalidRating {
            user_id: user_id.to_string(),
            recipe_id: recipe_id.to_string(),
            rating,
        });
    }
    Ok(rating as u8)
}

/// user id -> recipe id -> rating in 1..=5. One rating per user and recipe;
/// a later rating replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct RatingLedger {
    users: BTreeMap<String, BTreeMap<RecipeId, u8>>,
}

impl RatingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the rating that was replaced.
    pub fn record(&mut self, user_id: &str, recipe_id: &str, rating: u8) -> Option<u8> {
        self.users.entry(user_id.to_string()).or_default().insert(recipe_id.to_string(), rating)
    }

    pub fn ratings_of(&self, user_id: &str) -> Option<&BTreeMap<RecipeId, u8>> {
        self.users.get(user_id).filter(|r| !r.is_empty())
    }

    pub fn has_ratings(&self, user_id: &str) -> bool {
        self.ratings_of(user_id).is_some()
    }

    pub fn rating(&self, user_id: &str, recipe_id: &str) -> Option<u8> {
        self.users.get(user_id)?.get(recipe_id).copied()
    }

    pub fn users(&self) -> impl Iterator<Item = (&String, &BTreeMap<RecipeId, u8>)> {
        self.users.iter()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total number of ratings across all users.
    pub fn len(&self) -> usize {
        self.users.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_rating_replaces_earlier() {
        let mut ledger = RatingLedger::new();
        assert_eq!(ledger.record("ann", "r1", 3), None);
        assert_eq!(ledger.record("ann", "r1", 5), Some(3));
        assert_eq!(ledger.rating("ann", "r1"), Some(5));
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.has_ratings("bob"));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(validate_rating("ann", "r1", 0), Err(EngineError::InvalidRating { rating: 0, .. })));
        assert!(validate_rating("ann", "r1", 6).is_err());
        assert!(validate_rating("", "r1", 4).is_err());
        assert_eq!(validate_rating("ann", "r1", 5).unwrap(), 5);
    }

    #[test]
    fn entries_accept_camel_case() {
        let e: RatingEntry = serde_json::from_str(r#"{"userId": "u", "recipeId": "r", "rating": 4}"#).unwrap();
        assert_eq!(e, RatingEntry::new("u", "r", 4));
    }
}
