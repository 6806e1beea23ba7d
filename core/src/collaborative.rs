//! User-user collaborative filtering over the rating ledger.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::CollaborativeConfig;
use crate::ledger::RatingLedger;
use crate::recipe::RecipeId;

/// Pearson correlation of two paired sequences. `None` when either side has
/// zero variance or the sequences are shorter than two.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

pub struct CollaborativeScorer<'a> {
    ledger: &'a RatingLedger,
    config: &'a CollaborativeConfig,
}

impl<'a> CollaborativeScorer<'a> {
    pub fn new(ledger: &'a RatingLedger, config: &'a CollaborativeConfig) -> Self {
        Self { ledger, config }
    }

    /// Users whose shared ratings correlate with `user_id` above the
    /// configured minimum, most similar first.
    pub fn similar_users(&self, user_id: &str) -> Vec<(&'a str, f64)> {
        let Some(mine) = self.ledger.ratings_of(user_id) else {
            return Vec::new();
        };
        let mut similar: Vec<(&'a str, f64)> = Vec::new();
        for (other_id, theirs) in self.ledger.users() {
            if other_id == user_id {
                continue;
            }
            let (a, b): (Vec<f64>, Vec<f64>) = mine
                .iter()
                .filter_map(|(recipe, &r)| theirs.get(recipe).map(|&o| (r as f64, o as f64)))
                .unzip();
            if a.len() < self.config.min_common {
                continue;
            }
            if let Some(corr) = pearson(&a, &b) {
                if corr > self.config.min_correlation {
                    similar.push((other_id.as_str(), corr));
                }
            }
        }
        similar.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.cmp(y.0)));
        similar.truncate(self.config.max_neighbors);
        similar
    }

    /// Recipes the user has not rated, scored by the mean of
    /// `rating * similarity` over the similar users who rated them.
    /// `known` filters out recipes that are not in the live corpus.
    pub fn recommend(&self, user_id: &str, n: usize, known: impl Fn(&str) -> bool) -> Vec<(RecipeId, f64)> {
        let Some(mine) = self.ledger.ratings_of(user_id) else {
            return Vec::new();
        };
        let neighbors = self.similar_users(user_id);
        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for (other_id, similarity) in &neighbors {
            let Some(theirs) = self.ledger.ratings_of(other_id) else { continue };
            for (recipe, &rating) in theirs {
                if mine.contains_key(recipe) || !known(recipe) {
                    continue;
                }
                let slot = totals.entry(recipe.as_str()).or_insert((0.0, 0));
                slot.0 += rating as f64 * similarity;
                slot.1 += 1;
            }
        }
        let mut scored: Vec<(RecipeId, f64)> =
            totals.into_iter().map(|(id, (sum, count))| (id.to_string(), sum / count as f64)).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n);
        debug!(user = user_id, neighbors = neighbors.len(), candidates = scored.len(), "collaborative scores");
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> RatingLedger {
        let mut l = RatingLedger::new();
        for (user, recipe, rating) in [
            ("ann", "a", 5), ("ann", "b", 1), ("ann", "c", 4),
            ("bob", "a", 5), ("bob", "b", 2), ("bob", "c", 4), ("bob", "d", 5), ("bob", "ghost", 5),
            ("cat", "a", 1), ("cat", "b", 5), ("cat", "e", 5),
            ("dan", "a", 3), ("dan", "b", 3), ("dan", "f", 5),
        ] {
            l.record(user, recipe, rating);
        }
        l
    }

    #[test]
    fn pearson_basics() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0], &[2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&[3.0, 3.0], &[1.0, 5.0]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn keeps_positively_correlated_users_only() {
        let l = ledger();
        let cfg = CollaborativeConfig::default();
        let scorer = CollaborativeScorer::new(&l, &cfg);
        let similar = scorer.similar_users("ann");
        // cat is anti-correlated, dan has constant shared ratings.
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].0, "bob");
    }

    #[test]
    fn recommends_unrated_known_recipes() {
        let l = ledger();
        let cfg = CollaborativeConfig::default();
        let scorer = CollaborativeScorer::new(&l, &cfg);
        let recs = scorer.recommend("ann", 10, |id| id != "ghost");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].0, "d");
        assert!(recs[0].1 > 0.0);
        assert!(scorer.recommend("nobody", 10, |_| true).is_empty());
    }
}
