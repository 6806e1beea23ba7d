use serde::{Deserialize, Serialize};
use std::fmt;

pub type RecipeId = String;

const DEFAULT_PREP_MINUTES: u32 = 30;
const DEFAULT_COOK_MINUTES: u32 = 45;
const DEFAULT_SERVINGS: u32 = 4;
const DEFAULT_CUISINE: &str = "International";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lenient parse; anything unrecognised is Medium.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "easy" | "beginner" | "simple" => Difficulty::Easy,
            "hard" | "difficult" | "advanced" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

/// A validated recipe. Immutable once it is part of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_minutes: u32,
    pub cook_minutes: u32,
    pub servings: u32,
    pub cuisine: String,
    pub difficulty: Difficulty,
}

impl Recipe {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ingredients: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: Vec::new(),
            prep_minutes: DEFAULT_PREP_MINUTES,
            cook_minutes: DEFAULT_COOK_MINUTES,
            servings: DEFAULT_SERVINGS,
            cuisine: DEFAULT_CUISINE.into(),
            difficulty: Difficulty::Medium,
        }
    }

    pub fn with_instructions(mut self, steps: &[&str]) -> Self {
        self.instructions = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = cuisine.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_times(mut self, prep_minutes: u32, cook_minutes: u32) -> Self {
        self.prep_minutes = prep_minutes;
        self.cook_minutes = cook_minutes;
        self
    }

    /// Ingredients and instructions joined into one text body.
    pub fn full_text(&self) -> String {
        let mut text = self.ingredients.join(" ");
        for step in &self.instructions {
            text.push(' ');
            text.push_str(step);
        }
        text
    }
}

/// A list that the storage layer may hand over as an array, as a
/// JSON-encoded string of an array, or as one bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextList {
    List(Vec<String>),
    Text(String),
}

impl TextList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            TextList::List(items) => items,
            TextList::Text(text) => match serde_json::from_str::<Vec<String>>(&text) {
                Ok(items) => items,
                Err(_) if text.trim().is_empty() => Vec::new(),
                Err(_) => vec![text],
            },
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Number(f64),
    Text(String),
}

impl Count {
    fn minutes(self) -> Option<u32> {
        let value = match self {
            Count::Number(n) => n,
            Count::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        (value.is_finite() && value >= 0.0).then(|| value.round() as u32)
    }
}

/// Untrusted recipe record as supplied by the storage layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeRecord {
    #[serde(alias = "_id")]
    pub id: Option<serde_json::Value>,
    pub name: Option<String>,
    pub ingredients: Option<TextList>,
    #[serde(alias = "steps")]
    pub instructions: Option<TextList>,
    pub prep_time: Option<Count>,
    pub cook_time: Option<Count>,
    pub servings: Option<Count>,
    pub cuisine: Option<String>,
    pub difficulty: Option<String>,
}

impl From<Recipe> for RecipeRecord {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: Some(serde_json::Value::String(recipe.id)),
            name: Some(recipe.name),
            ingredients: Some(TextList::List(recipe.ingredients)),
            instructions: Some(TextList::List(recipe.instructions)),
            prep_time: Some(Count::Number(recipe.prep_minutes as f64)),
            cook_time: Some(Count::Number(recipe.cook_minutes as f64)),
            servings: Some(Count::Number(recipe.servings as f64)),
            cuisine: Some(recipe.cuisine),
            difficulty: Some(recipe.difficulty.to_string()),
        }
    }
}

impl RecipeRecord {
    /// Validate into a `Recipe`, or explain why the record is unusable.
    pub fn validate(self) -> Result<Recipe, String> {
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(other) if !other.is_null() && !other.is_string() => {
                return Err(format!("unsupported id value {other}"))
            }
            _ => return Err("missing id".into()),
        };
        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => return Err(format!("recipe {id}: missing name")),
        };
        let ingredients = self.ingredients.map(TextList::into_vec).unwrap_or_default();
        if ingredients.is_empty() {
            return Err(format!("recipe {id}: no ingredients"));
        }
        let instructions = self.instructions.map(TextList::into_vec).unwrap_or_default();
        let cuisine = self
            .cuisine
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CUISINE.to_string());
        Ok(Recipe {
            id,
            name,
            ingredients,
            instructions,
            prep_minutes: self.prep_time.and_then(Count::minutes).unwrap_or(DEFAULT_PREP_MINUTES),
            cook_minutes: self.cook_time.and_then(Count::minutes).unwrap_or(DEFAULT_COOK_MINUTES),
            servings: self.servings.and_then(Count::minutes).unwrap_or(DEFAULT_SERVINGS),
            cuisine,
            difficulty: self.difficulty.as_deref().map(Difficulty::parse_lenient).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> RecipeRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fills_defaults() {
        let r = record(r#"{"id": "r1", "name": "Toast", "ingredients": ["bread", "butter"]}"#)
            .validate()
            .unwrap();
        assert_eq!(r.prep_minutes, 30);
        assert_eq!(r.cook_minutes, 45);
        assert_eq!(r.servings, 4);
        assert_eq!(r.cuisine, "International");
        assert_eq!(r.difficulty, Difficulty::Medium);
    }

    #[test]
    fn accepts_stringly_typed_fields() {
        let r = record(
            r#"{"_id": 7, "name": "Soup", "ingredients": "[\"leek\", \"potato\"]",
                "steps": "Simmer everything.", "prep_time": "15", "difficulty": "EASY"}"#,
        )
        .validate()
        .unwrap();
        assert_eq!(r.id, "7");
        assert_eq!(r.ingredients, vec!["leek", "potato"]);
        assert_eq!(r.instructions, vec!["Simmer everything."]);
        assert_eq!(r.prep_minutes, 15);
        assert_eq!(r.difficulty, Difficulty::Easy);
    }

    #[test]
    fn rejects_records_without_ingredients() {
        let err = record(r#"{"id": "x", "name": "Air", "ingredients": []}"#).validate().unwrap_err();
        assert!(err.contains("no ingredients"));
        assert!(record(r#"{"name": "Nameless"}"#).validate().is_err());
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let r = record(r#"{"id": "a", "name": "B", "ingredients": ["c"], "servings": "lots", "cook_time": -3}"#)
            .validate()
            .unwrap();
        assert_eq!(r.servings, 4);
        assert_eq!(r.cook_minutes, 45);
    }
}
