use larder::{build_engine, collect_files, load_config, read_corpus, read_ratings, Overrides};
use larder_core::RecommendRequest;
use std::fs;
use tempfile::tempdir;

const CORPUS_JSON: &str = r#"[
  {"id": "cr", "name": "Chicken Rice", "ingredients": ["chicken", "rice", "egg"], "cuisine": "Asian"},
  {"id": "efr", "name": "Egg Fried Rice", "ingredients": "[\"egg\", \"rice\"]", "prep_time": "10"},
  {"id": "bs", "name": "Beef Stew", "ingredients": ["beef", "onion", "carrot"]},
  42
]"#;

#[test]
fn reads_json_and_jsonl_from_a_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.json"), CORPUS_JSON).unwrap();
    fs::create_dir_all(dir.path().join("more")).unwrap();
    fs::write(
        dir.path().join("more/b.jsonl"),
        "{\"id\": \"om\", \"name\": \"Omelette\", \"ingredients\": [\"egg\", \"butter\"]}\n\nnot json\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let files = collect_files(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let loaded = read_corpus(dir.path()).unwrap();
    assert_eq!(loaded.files, 2);
    assert_eq!(loaded.items.len(), 4);
    // the bare number and the non-JSON line
    assert_eq!(loaded.skipped, 2);
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(read_corpus(&dir.path().join("nope")).is_err());
}

#[test]
fn ratings_accept_camel_case_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratings.jsonl");
    fs::write(
        &path,
        "{\"userId\": \"ann\", \"recipeId\": \"cr\", \"rating\": 5}\n{\"user_id\": \"bob\", \"recipe_id\": \"bs\", \"rating\": 3}\n{\"user\": \"eve\"}\n",
    )
    .unwrap();
    let loaded = read_ratings(&path).unwrap();
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].user_id, "ann");
    assert_eq!(loaded.skipped, 1);
}

#[test]
fn config_file_and_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("larder.json");
    fs::write(&path, r#"{"k": 3, "metric": "euclidean", "vectorizer": {"min_df": 1}}"#).unwrap();

    let config = load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.k, 3);
    assert_eq!(config.vectorizer.min_df, 1);
    assert_eq!(config.vectorizer.max_features, 8000);

    let overrides = Overrides { k: Some(7), metric: None, diversity: Some(0.0) };
    let config = overrides.apply(config);
    assert_eq!(config.k, 7);
    assert_eq!(config.metric, "euclidean");
    assert_eq!(config.diversity, 0.0);

    assert_eq!(load_config(None).unwrap().k, 10);
    fs::write(&path, "{ not json").unwrap();
    assert!(load_config(Some(path.as_path())).is_err());
}

#[test]
fn builds_an_engine_from_files() {
    let dir = tempdir().unwrap();
    let corpus = dir.path().join("recipes.json");
    let ratings = dir.path().join("ratings.json");
    fs::write(&corpus, CORPUS_JSON).unwrap();
    fs::write(
        &ratings,
        r#"[{"user_id": "ann", "recipe_id": "bs", "rating": 5},
            {"user_id": "bob", "recipe_id": "bs", "rating": 4},
            {"user_id": "bob", "recipe_id": "cr", "rating": 9}]"#,
    )
    .unwrap();

    let (engine, summary) = build_engine(load_config(None).unwrap(), &corpus, Some(ratings.as_path())).unwrap();
    assert_eq!(summary.corpus.loaded, 3);
    assert_eq!(summary.unparsable, 1);
    let ratings = summary.ratings.unwrap();
    assert_eq!(ratings.loaded, 2);
    assert_eq!(ratings.skipped, 1);

    let popular = engine.popular_recipes(1).unwrap();
    assert_eq!(popular[0].recipe.id, "bs");

    let out = engine.recommend(&RecommendRequest::new("egg, rice").limit(2)).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(engine.recipe("efr").unwrap().prep_minutes, 10);
}
