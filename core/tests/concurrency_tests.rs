use std::thread;

use larder_core::{EngineConfig, Recipe, RecommendRequest, RecommendationEngine};

fn corpus(tag: &str) -> Vec<Recipe> {
    let proteins = ["chicken", "beef", "tofu", "salmon", "shrimp", "lamb"];
    let sides = ["rice", "noodles", "potatoes", "couscous"];
    let mut recipes = Vec::new();
    for (i, &p) in proteins.iter().enumerate() {
        for (j, &s) in sides.iter().enumerate() {
            recipes.push(Recipe::new(
                format!("{tag}-{i}-{j}"),
                format!("{p} with {s}"),
                &[p, s, "garlic", if (i + j) % 2 == 0 { "ginger" } else { "thyme" }],
            ));
        }
    }
    recipes
}

#[test]
fn queries_run_while_the_index_is_rebuilt() {
    let engine = RecommendationEngine::new(EngineConfig::default()).unwrap();
    engine.reload_corpus(corpus("v1")).unwrap();

    thread::scope(|s| {
        for t in 0..4 {
            let engine = &engine;
            s.spawn(move || {
                for i in 0..20 {
                    let query = if (t + i) % 2 == 0 { "chicken, rice" } else { "salmon, ginger" };
                    let out = engine.recommend(&RecommendRequest::new(query).limit(5)).unwrap();
                    assert!(!out.is_empty());
                    assert!(out.index_version == 1 || out.index_version == 2);
                    let prefix = format!("v{}-", out.index_version);
                    assert!(out.candidates.iter().all(|c| c.recipe.id.starts_with(&prefix)));
                }
            });
        }
        s.spawn(|| {
            engine.reload_corpus(corpus("v2")).unwrap();
        });
        s.spawn(|| {
            for i in 0..10 {
                engine.record_rating(&format!("user-{i}"), "v1-0-0", 1 + (i % 5)).unwrap();
            }
        });
    });

    let stats = engine.stats().unwrap();
    assert_eq!(stats.version, 2);
    assert!(engine.recipe("v2-0-0").is_some());
    assert!(engine.recipe("v1-0-0").is_none());
    assert_eq!(engine.popularity_of("v1-0-0").unwrap().count, 10);
}

#[test]
fn cached_results_follow_interleaved_ratings() {
    let ratings: Vec<(String, String, i64)> = (0..40)
        .map(|i| (format!("user-{}", i % 7), format!("v1-{}-{}", i % 6, i % 4), 1 + (i * 3 % 5)))
        .collect();
    let requests = [
        RecommendRequest::new("chicken, rice").limit(6),
        RecommendRequest::new("salmon, ginger").for_user("user-3").limit(6),
    ];

    let engine = RecommendationEngine::new(EngineConfig::default()).unwrap();
    engine.reload_corpus(corpus("v1")).unwrap();
    thread::scope(|s| {
        for t in 0..3 {
            let (engine, requests) = (&engine, &requests);
            s.spawn(move || {
                for i in 0..60 {
                    engine.recommend(&requests[(t + i) % 2]).unwrap();
                }
            });
        }
        s.spawn(|| {
            for (user, recipe, rating) in &ratings {
                engine.record_rating(user, recipe, *rating).unwrap();
                thread::yield_now();
            }
        });
    });

    let settled = RecommendationEngine::new(EngineConfig::default()).unwrap();
    settled.reload_corpus(corpus("v1")).unwrap();
    for (user, recipe, rating) in &ratings {
        settled.record_rating(user, recipe, *rating).unwrap();
    }
    for request in &requests {
        let served = engine.recommend(request).unwrap();
        let expected = settled.recommend(request).unwrap();
        assert_eq!(served.ids(), expected.ids());
        for (a, b) in served.candidates.iter().zip(&expected.candidates) {
            assert!((a.score - b.score).abs() < 1e-9, "{}: {} vs {}", a.recipe.id, a.score, b.score);
        }
    }
}

#[test]
fn engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecommendationEngine>();
}
