use serde::Serialize;
use std::collections::HashMap;

use crate::ledger::RatingLedger;
use crate::recipe::RecipeId;

/// Mean assumed for recipes nobody has rated yet.
pub const PRIOR_MEAN: f64 = 3.0;
/// Review count at which the coverage term saturates.
const COVERAGE_SATURATION: f64 = 10.0;
const COVERAGE_WEIGHT: f64 = 0.6;
const RATING_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopularityStats {
    pub mean: f64,
    pub count: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Aggregate {
    sum: u64,
    count: usize,
}

/// Running mean rating and review count per recipe.
#[derive(Debug, Clone, Default)]
pub struct PopularityTracker {
    totals: HashMap<RecipeId, Aggregate>,
}

/// `0.6 * coverage + 0.4 * mean / 5` where coverage is
/// `(mean / 5) * min(1, count / 10)`.
pub fn popularity_score(mean: f64, count: usize) -> f64 {
    let coverage = (mean / 5.0) * (count as f64 / COVERAGE_SATURATION).min(1.0);
    COVERAGE_WEIGHT * coverage + RATING_WEIGHT * mean / 5.0
}

impl PopularityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ledger(ledger: &RatingLedger) -> Self {
        let mut tracker = Self::new();
        for (_, ratings) in ledger.users() {
            for (recipe_id, &rating) in ratings {
                tracker.apply(recipe_id, None, rating);
            }
        }
        tracker
    }

    /// Fold one rating into the aggregate. `previous` is the rating the same
    /// user had given before, which the new one replaces.
    pub fn apply(&mut self, recipe_id: &str, previous: Option<u8>, rating: u8) {
        let agg = self.totals.entry(recipe_id.to_string()).or_default();
        match previous {
            Some(old) => agg.sum = agg.sum - old as u64 + rating as u64,
            None => {
                agg.sum += rating as u64;
                agg.count += 1;
            }
        }
    }

    pub fn stats(&self, recipe_id: &str) -> Option<PopularityStats> {
        let agg = self.totals.get(recipe_id).filter(|a| a.count > 0)?;
        let mean = agg.sum as f64 / agg.count as f64;
        Some(PopularityStats { mean, count: agg.count, score: popularity_score(mean, agg.count) })
    }

    pub fn score(&self, recipe_id: &str) -> f64 {
        self.stats(recipe_id).map(|s| s.score).unwrap_or_else(|| popularity_score(PRIOR_MEAN, 0))
    }

    /// Corpus positions ranked by popularity. Equal scores keep corpus order.
    pub fn ranked(&self, ids: &[RecipeId]) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = ids.iter().enumerate().map(|(i, id)| (i, self.score(id))).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    pub fn rated_recipes(&self) -> usize {
        self.totals.values().filter(|a| a.count > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_and_count() {
        let mut p = PopularityTracker::new();
        p.apply("r1", None, 5);
        p.apply("r1", None, 4);
        p.apply("r1", None, 3);
        let s = p.stats("r1").unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean - 4.0).abs() < 1e-12);
        assert!((s.score - (0.6 * 0.8 * 0.3 + 0.4 * 0.8)).abs() < 1e-12);
    }

    #[test]
    fn replacing_a_rating_keeps_the_count() {
        let mut p = PopularityTracker::new();
        p.apply("r1", None, 1);
        p.apply("r1", Some(1), 5);
        let s = p.stats("r1").unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.mean, 5.0);
    }

    #[test]
    fn unrated_recipes_use_the_prior_and_keep_order() {
        let mut p = PopularityTracker::new();
        p.apply("b", None, 5);
        let ids: Vec<RecipeId> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ranked = p.ranked(&ids);
        assert_eq!(ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 0, 2]);
        assert!((p.score("a") - 0.4 * 0.6).abs() < 1e-12);
        assert!(p.stats("a").is_none());
    }

    #[test]
    fn rebuilds_from_ledger() {
        let mut ledger = RatingLedger::new();
        ledger.record("u1", "r", 2);
        ledger.record("u2", "r", 4);
        let p = PopularityTracker::from_ledger(&ledger);
        assert_eq!(p.stats("r").unwrap().mean, 3.0);
        assert_eq!(p.rated_recipes(), 1);
    }
}
