//! Ingredient importance: inverse document frequency shaped by culinary
//! category, so distinctive ingredients dominate and pantry staples vanish.

use std::collections::{BTreeMap, BTreeSet};

use crate::recipe::RecipeId;

pub const MAX_IMPORTANCE: f64 = 10.0;
const MIN_RAW_SCORE: f64 = 0.01;

const STAPLES: &[&str] = &["salt", "pepper", "water", "oil", "sugar"];
const MODERATE_STAPLES: &[&str] = &["garlic", "onion", "butter", "flour", "eggs"];

const COMMON: &[&str] = &[
    "salt", "kosher salt", "sea salt", "table salt",
    "pepper", "black pepper", "white pepper",
    "sugar", "white sugar", "brown sugar",
    "water", "ice water", "boiling water",
    "oil", "vegetable oil", "olive oil", "cooking oil", "canola oil",
    "butter",
    "flour", "all-purpose flour", "baking powder", "baking soda", "vanilla extract",
    "eggs", "egg", "egg whites", "egg yolks",
    "milk", "whole milk", "skim milk",
    "garlic", "garlic cloves", "garlic clove", "onion", "onions",
    "parsley",
    "cup", "teaspoon", "tablespoon", "pound", "ounce",
];
const COMMON_KEYWORDS: &[&str] = &["salt", "pepper", "sugar", "water", "oil", "butter", "flour", "egg"];

const PROTEINS: &[&str] = &[
    "beef", "chicken", "pork", "lamb", "veal", "duck", "turkey", "venison",
    "fish", "salmon", "tuna", "cod", "halibut", "trout", "bass", "snapper",
    "shrimp", "crab", "lobster", "scallops", "mussels", "clams", "oysters",
    "tofu", "tempeh", "seitan", "beans", "lentils", "chickpeas", "quinoa",
];
const UNIQUE_PRODUCE: &[&str] = &[
    "truffle", "saffron", "artichoke", "asparagus", "avocado",
    "eggplant", "zucchini", "fennel", "leek", "shallot",
];
const SPECIALTY_GRAINS: &[&str] = &["quinoa", "barley", "couscous", "polenta", "risotto", "bulgur"];
const SPECIALTY_DAIRY: &[&str] = &[
    "parmesan", "mozzarella", "cheddar", "brie", "goat cheese",
    "ricotta", "feta", "blue cheese", "gruyere",
];
const HERBS_SPICES: &[&str] = &[
    "basil", "oregano", "thyme", "rosemary", "sage", "cilantro",
    "parsley", "cumin", "paprika", "turmeric", "ginger",
];
const SPECIAL: &[&str] = &[
    "beef", "chicken", "pork", "lamb", "fish", "salmon", "tuna", "shrimp",
    "crab", "lobster", "duck", "turkey", "veal",
    "truffle", "saffron", "caviar", "foie gras", "wagyu",
    "artichoke", "asparagus", "avocado", "eggplant", "zucchini",
    "parmesan", "mozzarella", "cheddar", "brie", "goat cheese", "ricotta", "feta", "blue cheese",
    "rice", "pasta", "quinoa", "barley", "couscous", "polenta", "risotto",
    "cardamom", "star anise", "lemongrass", "ginger", "turmeric", "cumin",
    "coriander", "paprika", "cayenne",
];
const PREPARATIONS: &[&str] = &[
    "marinated", "smoked", "cured", "aged", "fermented", "pickled",
    "roasted", "grilled", "braised", "confit", "sous vide",
];

fn mentions(ingredient: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| ingredient.contains(t))
}

/// Basic pantry item. The same predicate classifies corpus entries and
/// matched query ingredients.
pub fn is_common_ingredient(ingredient: &str) -> bool {
    let ingredient = ingredient.trim();
    COMMON.contains(&ingredient) || mentions(ingredient, COMMON_KEYWORDS)
}

pub fn is_protein_source(ingredient: &str) -> bool {
    mentions(ingredient, PROTEINS)
}

pub fn is_special_ingredient(ingredient: &str) -> bool {
    mentions(ingredient, SPECIAL)
}

pub fn has_special_preparation(ingredient: &str) -> bool {
    mentions(ingredient, PREPARATIONS)
}

pub fn category_multiplier(ingredient: &str) -> f64 {
    if is_protein_source(ingredient) {
        2.5
    } else if mentions(ingredient, UNIQUE_PRODUCE) {
        2.0
    } else if mentions(ingredient, SPECIALTY_GRAINS) {
        1.8
    } else if mentions(ingredient, SPECIALTY_DAIRY) {
        1.6
    } else if mentions(ingredient, HERBS_SPICES) {
        1.2
    } else {
        1.0
    }
}

fn common_penalty(ingredient: &str) -> f64 {
    if !is_common_ingredient(ingredient) {
        1.0
    } else if STAPLES.contains(&ingredient) {
        0.05
    } else if MODERATE_STAPLES.contains(&ingredient) {
        0.2
    } else {
        0.4
    }
}

/// Unscaled importance for an ingredient seen in `count` of `total` recipes.
pub fn raw_importance(ingredient: &str, count: usize, total: usize) -> f64 {
    let mut score = (total.max(1) as f64 / count.max(1) as f64).ln() + 1.0;
    score *= category_multiplier(ingredient);
    score *= common_penalty(ingredient);
    if is_special_ingredient(ingredient) {
        score *= 2.0;
    }
    if is_protein_source(ingredient) {
        score *= 1.8;
    }
    if has_special_preparation(ingredient) {
        score *= 1.3;
    }
    score.max(MIN_RAW_SCORE)
}

/// A canonical ingredient and the recipes (by corpus position) containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientEntry {
    pub name: String,
    /// Unstemmed normalized form; the category predicates run on this.
    pub label: String,
    pub importance: f64,
    pub common: bool,
    pub recipes: Vec<usize>,
}

/// Importance for every canonical ingredient in a corpus, rescaled so the
/// maximum is `MAX_IMPORTANCE`. Always computed as a full pass.
#[derive(Debug, Clone, Default)]
pub struct ImportanceTable {
    entries: BTreeMap<String, IngredientEntry>,
}

impl ImportanceTable {
    /// `recipes[i]` holds the canonical ingredient names of recipe `i`,
    /// which double as their own labels.
    pub fn compute(recipes: &[Vec<String>]) -> Self {
        let labeled: Vec<Vec<(String, String)>> =
            recipes.iter().map(|names| names.iter().map(|n| (n.clone(), n.clone())).collect()).collect();
        Self::compute_labeled(&labeled)
    }

    /// `recipes[i]` holds `(canonical, label)` pairs for recipe `i`. The
    /// canonical name keys the table; the first label seen for it is what
    /// gets classified, so stemming never hides a category keyword.
    pub fn compute_labeled(recipes: &[Vec<(String, String)>]) -> Self {
        let total = recipes.len();
        let mut postings: BTreeMap<String, (String, BTreeSet<usize>)> = BTreeMap::new();
        for (idx, ingredients) in recipes.iter().enumerate() {
            for (name, label) in ingredients.iter().filter(|(n, _)| !n.is_empty()) {
                postings.entry(name.clone()).or_insert_with(|| (label.clone(), BTreeSet::new())).1.insert(idx);
            }
        }

        let mut entries: BTreeMap<String, IngredientEntry> = postings
            .into_iter()
            .map(|(name, (label, docs))| {
                let importance = raw_importance(&label, docs.len(), total);
                let common = is_common_ingredient(&label);
                let entry = IngredientEntry {
                    name: name.clone(),
                    label,
                    importance,
                    common,
                    recipes: docs.into_iter().collect(),
                };
                (name, entry)
            })
            .collect();

        let max = entries.values().map(|e| e.importance).fold(0.0_f64, f64::max);
        if max > 0.0 {
            for entry in entries.values_mut() {
                entry.importance = entry.importance / max * MAX_IMPORTANCE;
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&IngredientEntry> {
        self.entries.get(name)
    }

    /// Importance of a canonical name, 1.0 when unknown.
    pub fn importance(&self, name: &str) -> f64 {
        self.entries.get(name).map(|e| e.importance).unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &IngredientEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries ranked by importance, highest first; ties by name.
    pub fn ranked(&self) -> Vec<&IngredientEntry> {
        let mut ranked: Vec<&IngredientEntry> = self.entries.values().collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance).then_with(|| a.name.cmp(&b.name)));
        ranked
    }

    /// Recipe ids for an entry, resolved against the corpus order.
    pub fn recipe_ids<'a>(&self, name: &str, ids: &'a [RecipeId]) -> Vec<&'a RecipeId> {
        self.get(name)
            .map(|e| e.recipes.iter().filter_map(|&i| ids.get(i)).collect())
            .unwrap_or_default()
    }
}
