use criterion::{black_box, criterion_group, criterion_main, Criterion};
use larder_core::{EngineConfig, KnnOptions, Normalizer, Query, Recipe, RecommendRequest, RecommendationEngine};

const PROTEINS: [&str; 8] = ["chicken breast", "beef", "pork shoulder", "tofu", "salmon", "shrimp", "lamb", "eggs"];
const BASES: [&str; 6] = ["rice", "pasta", "potatoes", "quinoa", "noodles", "bread"];
const EXTRAS: [&str; 10] = [
    "garlic", "ginger", "basil", "cumin", "paprika", "lemon", "spinach", "mushrooms", "tomatoes", "coconut milk",
];

fn synthetic_corpus(n: usize) -> Vec<Recipe> {
    (0..n)
        .map(|i| {
            let ingredients = [
                PROTEINS[i % PROTEINS.len()],
                BASES[(i / 3) % BASES.len()],
                EXTRAS[i % EXTRAS.len()],
                EXTRAS[(i * 7 + 3) % EXTRAS.len()],
                "salt",
                "olive oil",
            ];
            Recipe::new(format!("r{i}"), format!("Dish {i}"), &ingredients)
                .with_times(10 + (i % 50) as u32, 20 + (i % 90) as u32)
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::new(true);
    let lines = [
        "2 lbs boneless skinless chicken thighs",
        "1/2 cup finely chopped fresh parsley",
        "3 large ripe tomatoes, diced",
        "1 tbsp extra virgin olive oil",
    ];
    c.bench_function("normalize_ingredient_lines", |b| {
        b.iter(|| {
            for line in lines {
                black_box(normalizer.normalize(black_box(line)));
            }
        })
    });
}

fn bench_recommend(c: &mut Criterion) {
    let config = EngineConfig { cache_capacity: 1, ..EngineConfig::default() };
    let engine = RecommendationEngine::new(config).unwrap();
    engine.reload_corpus(synthetic_corpus(2000)).unwrap();
    let query = Query::from("chicken, rice, garlic, spinach");
    let options = KnnOptions { num_recommendations: 10, diversity: 0.3, filters: Default::default() };

    c.bench_function("recommend_knn_2000", |b| {
        b.iter(|| engine.recommend_knn(black_box(&query), &options).unwrap())
    });

    // Alternating limits against a one-entry cache keep every call a miss.
    let mut limit = 10usize;
    c.bench_function("recommend_hybrid_2000", |b| {
        b.iter(|| {
            limit = if limit == 10 { 11 } else { 10 };
            let request = RecommendRequest::new(query.clone()).for_user("bench").limit(limit);
            engine.recommend(black_box(&request)).unwrap()
        })
    });
}

criterion_group!(benches, bench_normalize, bench_recommend);
criterion_main!(benches);
