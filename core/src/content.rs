use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::recipe::{Difficulty, Recipe};
use crate::vectorizer::{SparseVector, TfidfParams, TfidfVectorizer};

const CUISINE_BOOST: f32 = 1.5;
const DIFFICULTY_BOOST: f32 = 1.3;
const PREP_TIME_BOOST: f32 = 1.2;

/// Soft preferences. Unlike filters they never exclude a recipe, they only
/// lift the ones that satisfy them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub cuisine: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub max_prep_minutes: Option<u32>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.cuisine.is_none() && self.difficulty.is_none() && self.max_prep_minutes.is_none()
    }

    pub fn boost(&self, recipe: &Recipe) -> f32 {
        let mut factor = 1.0;
        if let Some(cuisine) = &self.cuisine {
            if recipe.cuisine.eq_ignore_ascii_case(cuisine.trim()) {
                factor *= CUISINE_BOOST;
            }
        }
        if self.difficulty == Some(recipe.difficulty) {
            factor *= DIFFICULTY_BOOST;
        }
        if let Some(max) = self.max_prep_minutes {
            if recipe.prep_minutes <= max {
                factor *= PREP_TIME_BOOST;
            }
        }
        factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentHit {
    pub position: usize,
    pub similarity: f32,
    pub score: f32,
}

/// Plain TF-IDF over each recipe's ingredients and instructions.
#[derive(Debug, Clone)]
pub struct ContentModel {
    vectorizer: TfidfVectorizer,
    rows: Vec<SparseVector>,
}

impl ContentModel {
    pub fn fit(recipes: &[Recipe], max_features: usize, stemming: bool) -> Self {
        let texts: Vec<String> = recipes.iter().map(Recipe::full_text).collect();
        let mut vectorizer = TfidfVectorizer::new(TfidfParams { max_features, stemming, ..TfidfParams::default() });
        let rows = vectorizer.fit_transform(&texts);
        Self { vectorizer, rows }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }

    /// Top `n` recipes by cosine similarity times preference boost.
    /// Recipes sharing no term with the query are left out.
    pub fn score(&self, query: &str, recipes: &[Recipe], preferences: Option<&UserPreferences>, n: usize) -> Vec<ContentHit> {
        let q = self.vectorizer.transform(query);
        if q.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<ContentHit> = self
            .rows
            .par_iter()
            .enumerate()
            .filter_map(|(position, row)| {
                // Rows and query are unit length, so the dot product is the cosine.
                let similarity = row.dot(&q);
                if similarity <= 0.0 {
                    return None;
                }
                let boost = preferences.map_or(1.0, |p| p.boost(&recipes[position]));
                Some(ContentHit { position, similarity, score: similarity * boost })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.position.cmp(&b.position)));
        hits.truncate(n);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Recipe> {
        vec![
            Recipe::new("1", "Pesto", &["basil", "pine nuts", "parmesan"]).with_cuisine("Italian"),
            Recipe::new("2", "Basil Stir Fry", &["basil", "chicken", "chili"])
                .with_cuisine("Thai")
                .with_instructions(&["Fry the chicken with basil."]),
            Recipe::new("3", "Porridge", &["oats", "milk"]).with_difficulty(Difficulty::Easy),
        ]
    }

    #[test]
    fn ranks_by_text_similarity() {
        let recipes = corpus();
        let model = ContentModel::fit(&recipes, 1000, false);
        let hits = model.score("chicken basil", &recipes, None, 10);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits.len(), 2, "porridge shares nothing with the query");
        assert!(model.score("quinoa", &recipes, None, 10).is_empty());
    }

    #[test]
    fn preferences_lift_matching_recipes() {
        let recipes = corpus();
        let model = ContentModel::fit(&recipes, 1000, false);
        let prefs = UserPreferences { cuisine: Some("italian".into()), ..UserPreferences::default() };
        let plain = model.score("basil", &recipes, None, 10);
        let boosted = model.score("basil", &recipes, Some(&prefs), 10);
        let pesto_plain = plain.iter().find(|h| h.position == 0).unwrap();
        let pesto_boosted = boosted.iter().find(|h| h.position == 0).unwrap();
        assert!((pesto_boosted.score - pesto_plain.score * 1.5).abs() < 1e-6);
        assert_eq!(boosted[0].position, 0);
    }

    #[test]
    fn boosts_multiply() {
        let recipe = Recipe::new("x", "Quick", &["egg"]).with_times(10, 5).with_difficulty(Difficulty::Easy);
        let prefs = UserPreferences {
            cuisine: Some("International".into()),
            difficulty: Some(Difficulty::Easy),
            max_prep_minutes: Some(15),
        };
        assert!((prefs.boost(&recipe) - 1.5 * 1.3 * 1.2).abs() < 1e-6);
        assert_eq!(UserPreferences::default().boost(&recipe), 1.0);
    }
}
