use serde::Serialize;
use similar::TextDiff;
use tracing::debug;

use crate::importance::ImportanceTable;
use crate::normalize::Normalizer;

pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Contains,
    Fuzzy,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientMatch {
    pub input: String,
    /// Canonical vocabulary entry, absent when nothing matched.
    pub entry: Option<String>,
    pub confidence: f32,
    pub kind: MatchKind,
}

/// Matched query ingredients, partitioned by the common-ingredient predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchedIngredients {
    pub matched: Vec<String>,
    pub important: Vec<String>,
    pub common: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<String>,
}

impl MatchedIngredients {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Split a free-text query on commas into trimmed, non-empty tokens.
pub fn split_query(text: &str) -> Vec<String> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn sequence_ratio(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

/// Maps user-typed ingredient text onto the known vocabulary.
pub struct FuzzyMatcher<'a> {
    table: &'a ImportanceTable,
    normalizer: Normalizer,
    threshold: f32,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(table: &'a ImportanceTable, normalizer: Normalizer, threshold: f32) -> Self {
        Self { table, normalizer, threshold }
    }

    /// Best entry for one token: exact variant hit, then substring overlap,
    /// then character-sequence similarity at or above the threshold.
    pub fn match_one(&self, input: &str) -> IngredientMatch {
        let variants = self.normalizer.variants(input);
        let none = IngredientMatch { input: input.to_string(), entry: None, confidence: 0.0, kind: MatchKind::None };
        if variants.is_empty() {
            return none;
        }

        for variant in &variants {
            if self.table.get(variant).is_some() {
                return IngredientMatch {
                    input: input.to_string(),
                    entry: Some(variant.clone()),
                    confidence: 1.0,
                    kind: MatchKind::Exact,
                };
            }
        }

        let mut best: Option<(&str, f32)> = None;
        for variant in &variants {
            for name in self.table.names() {
                if name.contains(variant.as_str()) || variant.contains(name) {
                    let (short, long) = if name.len() < variant.len() { (name, variant.as_str()) } else { (variant.as_str(), name) };
                    let overlap = short.chars().count() as f32 / long.chars().count().max(1) as f32;
                    if best.map_or(true, |(_, score)| overlap > score) {
                        best = Some((name, overlap));
                    }
                }
            }
        }
        if let Some((name, confidence)) = best {
            return IngredientMatch {
                input: input.to_string(),
                entry: Some(name.to_string()),
                confidence,
                kind: MatchKind::Contains,
            };
        }

        for variant in &variants {
            for name in self.table.names() {
                let ratio = sequence_ratio(variant, name);
                if ratio >= self.threshold && best.map_or(true, |(_, score)| ratio > score) {
                    best = Some((name, ratio));
                }
            }
        }
        match best {
            Some((name, confidence)) => IngredientMatch {
                input: input.to_string(),
                entry: Some(name.to_string()),
                confidence,
                kind: MatchKind::Fuzzy,
            },
            None => none,
        }
    }

    /// Match every token and partition the hits into important and common.
    /// Duplicate hits on the same entry are kept once.
    pub fn match_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> MatchedIngredients {
        let mut out = MatchedIngredients::default();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let hit = self.match_one(token);
            let Some(entry) = hit.entry else {
                debug!(input = token, "no ingredient match");
                out.unmatched.push(token.to_string());
                continue;
            };
            if out.matched.contains(&entry) {
                continue;
            }
            let common = self.table.get(&entry).map(|e| e.common).unwrap_or(false);
            debug!(input = token, entry = %entry, kind = ?hit.kind, confidence = hit.confidence, common, "ingredient matched");
            if common {
                out.common.push(entry.clone());
            } else {
                out.important.push(entry.clone());
            }
            out.matched.push(entry);
        }
        out
    }

    pub fn match_text(&self, text: &str) -> MatchedIngredients {
        self.match_tokens(&split_query(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ImportanceTable {
        let raw: &[&[&str]] = &[
            &["tomatoes", "basil", "mozzarella"],
            &["chicken breast", "rice", "salt"],
            &["blueberries", "flour", "sugar"],
        ];
        ImportanceTable::compute(&raw.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect::<Vec<_>>())
    }

    #[test]
    fn exact_through_plural_variant() {
        let table = table();
        let m = FuzzyMatcher::new(&table, Normalizer::default(), DEFAULT_THRESHOLD);
        let hit = m.match_one("Tomato");
        assert_eq!(hit.kind, MatchKind::Exact);
        assert_eq!(hit.entry.as_deref(), Some("tomatoes"));
        assert_eq!(hit.confidence, 1.0);
    }

    #[test]
    fn substring_then_fuzzy() {
        let table = table();
        let m = FuzzyMatcher::new(&table, Normalizer::default(), DEFAULT_THRESHOLD);
        let hit = m.match_one("chicken");
        assert_eq!(hit.kind, MatchKind::Contains);
        assert_eq!(hit.entry.as_deref(), Some("chicken breast"));

        let hit = m.match_one("mozarella");
        assert_eq!(hit.kind, MatchKind::Fuzzy);
        assert_eq!(hit.entry.as_deref(), Some("mozzarella"));
        assert!(hit.confidence >= DEFAULT_THRESHOLD);

        assert_eq!(m.match_one("xylophone").kind, MatchKind::None);
    }

    #[test]
    fn partitions_common_and_important() {
        let table = table();
        let m = FuzzyMatcher::new(&table, Normalizer::default(), DEFAULT_THRESHOLD);
        let out = m.match_text("rice, salt, , unobtainium, rice");
        assert_eq!(out.matched, vec!["rice", "salt"]);
        assert_eq!(out.important, vec!["rice"]);
        assert_eq!(out.common, vec!["salt"]);
        assert_eq!(out.unmatched, vec!["unobtainium"]);
    }
}
