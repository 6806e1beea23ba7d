use larder_core::importance::ImportanceTable;
use larder_core::matcher::{FuzzyMatcher, MatchKind, DEFAULT_THRESHOLD};
use larder_core::normalize::tokenize;
use larder_core::{EngineConfig, Normalizer, Recipe, RecommendationEngine};

fn table(normalizer: Normalizer, recipes: &[&[&str]]) -> ImportanceTable {
    let canonical: Vec<Vec<String>> =
        recipes.iter().map(|r| r.iter().map(|i| normalizer.normalize(i)).collect()).collect();
    ImportanceTable::compute(&canonical)
}

#[test]
fn singular_and_plural_resolve_to_the_same_entry() {
    let n = Normalizer::default();
    let table = table(n, &[&["2 tomatoes", "1 cup basil"], &["4 potatoes", "2 peaches", "3 cherries"]]);
    let m = FuzzyMatcher::new(&table, n, DEFAULT_THRESHOLD);
    for (a, b) in [("tomato", "tomatoes"), ("potato", "potatoes"), ("peach", "peaches"), ("cherry", "cherries")] {
        let x = m.match_one(a);
        let y = m.match_one(b);
        assert_eq!(x.kind, MatchKind::Exact, "{a}");
        assert_eq!(y.kind, MatchKind::Exact, "{b}");
        assert_eq!(x.entry, y.entry, "{a} / {b}");
    }
}

#[test]
fn quantities_and_descriptors_do_not_leak_into_entries() {
    let n = Normalizer::default();
    let table = table(n, &[&["1/2 cup finely chopped fresh parsley", "2 lbs boneless chicken thighs"]]);
    let names: Vec<&str> = table.names().collect();
    assert_eq!(names, vec!["chicken thighs", "parsley"]);
}

#[test]
fn stemming_is_applied_consistently() {
    let n = Normalizer::new(true);
    assert_eq!(n.normalize("Roasted Peppers"), n.normalize("roasted pepper"));
    let words = tokenize("Running runners run quickly", true);
    assert!(words.iter().filter(|w| w.as_str() == "run").count() >= 2);
}

#[test]
fn engine_exposes_matching_standalone() {
    let engine = RecommendationEngine::new(EngineConfig::default()).unwrap();
    engine
        .reload_corpus(vec![
            Recipe::new("1", "Caprese", &["tomatoes", "mozzarella", "basil", "olive oil"]),
            Recipe::new("2", "Tomato Soup", &["tomatoes", "onion", "salt"]),
        ])
        .unwrap();
    let matched = engine.match_ingredients("Tomato, mozarella, olive oil, dragonfruit").unwrap();
    assert_eq!(matched.important, vec!["tomatoes", "mozzarella"]);
    assert_eq!(matched.common, vec!["olive oil"]);
    assert_eq!(matched.unmatched, vec!["dragonfruit"]);
    assert!(engine.match_ingredients("").unwrap().is_empty());
}
