use crate::importance::{is_protein_source, ImportanceTable, MAX_IMPORTANCE};
use crate::recipe::{Difficulty, Recipe};

pub const MAJOR_CUISINES: [&str; 6] = ["italian", "chinese", "mexican", "indian", "french", "american"];

/// prep, cook, servings, ingredient count, step count, cuisines,
/// three difficulty flags, mean importance, protein flag.
pub const FEATURE_WIDTH: usize = 5 + MAJOR_CUISINES.len() + 3 + 2;

fn difficulty_flags(d: Difficulty) -> [f32; 3] {
    match d {
        Difficulty::Easy => [1.0, 0.0, 0.0],
        Difficulty::Medium => [0.0, 1.0, 0.0],
        Difficulty::Hard => [0.0, 0.0, 1.0],
    }
}

/// Fixed-width numeric attributes of a recipe. `canonical` holds the
/// normalized ingredient names used to look up importance.
pub fn recipe_features(recipe: &Recipe, canonical: &[String], table: &ImportanceTable) -> [f32; FEATURE_WIDTH] {
    let mut f = [0.0f32; FEATURE_WIDTH];
    f[0] = recipe.prep_minutes as f32 / 100.0;
    f[1] = recipe.cook_minutes as f32 / 100.0;
    f[2] = recipe.servings as f32 / 10.0;
    f[3] = recipe.ingredients.len() as f32 / 20.0;
    f[4] = recipe.instructions.len() as f32 / 20.0;

    let cuisine = recipe.cuisine.to_lowercase();
    for (k, major) in MAJOR_CUISINES.iter().enumerate() {
        f[5 + k] = if cuisine.contains(major) { 1.0 } else { 0.0 };
    }
    let base = 5 + MAJOR_CUISINES.len();
    f[base..base + 3].copy_from_slice(&difficulty_flags(recipe.difficulty));

    let mean_importance = if canonical.is_empty() {
        1.0
    } else {
        canonical.iter().map(|c| table.importance(c)).sum::<f64>() / canonical.len() as f64
    };
    f[base + 3] = (mean_importance / MAX_IMPORTANCE) as f32;
    let has_protein = canonical.iter().any(|c| is_protein_source(table.get(c).map_or(c.as_str(), |e| e.label.as_str())));
    f[base + 4] = if has_protein { 1.0 } else { 0.0 };
    f
}

/// Stand-in attributes for a query, which carries no metadata of its own.
pub fn query_features() -> [f32; FEATURE_WIDTH] {
    let mut f = [0.0f32; FEATURE_WIDTH];
    f[0] = 30.0 / 100.0;
    f[1] = 45.0 / 100.0;
    f[2] = 4.0 / 10.0;
    f[3] = 8.0 / 20.0;
    f[4] = 10.0 / 20.0;
    let base = 5 + MAJOR_CUISINES.len();
    f[base..base + 3].copy_from_slice(&difficulty_flags(Difficulty::Medium));
    f[base + 3] = 0.5;
    f[base + 4] = 1.0;
    f
}
