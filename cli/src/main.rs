use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use larder::{build_engine, load_config, Output, Overrides, CONFIG_ENV};
use larder_core::{Difficulty, Filters, FusionWeights, KnnOptions, Query, RecommendRequest, UserPreferences};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Recommend recipes from the ingredients you have", long_about = None)]
struct Cli {
    /// Recipe corpus (JSON/JSONL file or directory)
    #[arg(long, global = true, default_value = "./recipes")]
    corpus: PathBuf,
    /// Rating ledger (JSON/JSONL file or directory)
    #[arg(long, global = true)]
    ratings: Option<PathBuf>,
    /// Engine config file
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    k: Option<usize>,
    /// cosine, euclidean or manhattan
    #[arg(long, global = true)]
    metric: Option<String>,
    #[arg(long, global = true)]
    diversity: Option<f32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Hybrid,
    Knn,
    Content,
    Collaborative,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend recipes for a comma-separated ingredient list
    Recommend {
        query: String,
        #[arg(long, value_enum, default_value_t = Mode::Hybrid)]
        mode: Mode,
        #[arg(long)]
        user: Option<String>,
        /// Number of recommendations (defaults to k)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Only recipes whose cuisine contains this text
        #[arg(long)]
        cuisine: Option<String>,
        #[arg(long)]
        max_prep: Option<u32>,
        /// Boost recipes of this cuisine
        #[arg(long)]
        prefer_cuisine: Option<String>,
        /// Boost recipes of this difficulty
        #[arg(long)]
        prefer_difficulty: Option<String>,
        /// Boost recipes that fit this prep time
        #[arg(long)]
        prefer_max_prep: Option<u32>,
        /// Fusion weights as knn,content,collaborative,popularity
        #[arg(long, value_delimiter = ',', num_args = 4)]
        weights: Option<Vec<f64>>,
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Show how free text resolves against the ingredient vocabulary
    Match { text: String },
    /// Most popular recipes by rating
    Popular {
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },
    /// Index statistics and load report
    Inspect {
        /// Also list the full ingredient vocabulary
        #[arg(long, default_value_t = false)]
        vocabulary: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();

    let overrides = Overrides { k: cli.k, metric: cli.metric.clone(), diversity: cli.diversity };
    let config = overrides.apply(load_config(cli.config.as_deref())?);
    let (engine, summary) = build_engine(config, &cli.corpus, cli.ratings.as_deref())?;

    match cli.command {
        Commands::Recommend {
            query,
            mode,
            user,
            limit,
            cuisine,
            max_prep,
            prefer_cuisine,
            prefer_difficulty,
            prefer_max_prep,
            weights,
            explain,
        } => {
            let num = limit.unwrap_or(engine.config().k);
            let query = Query::from(query);
            let filters = Filters { cuisine, max_prep_minutes: max_prep };
            let preferences = UserPreferences {
                cuisine: prefer_cuisine,
                difficulty: prefer_difficulty.as_deref().map(Difficulty::parse_lenient),
                max_prep_minutes: prefer_max_prep,
            };
            let preferences = (!preferences.is_empty()).then_some(preferences);
            match mode {
                Mode::Hybrid => {
                    let mut request = RecommendRequest::new(query).with_filters(filters).limit(num);
                    if let Some(user) = user {
                        request = request.for_user(user);
                    }
                    if let Some(preferences) = preferences {
                        request = request.with_preferences(preferences);
                    }
                    if let Some(w) = weights {
                        let weights = FusionWeights::new(w[0], w[1], w[2], w[3]).context("invalid --weights")?;
                        request = request.with_weights(weights);
                    }
                    if explain {
                        request = request.explained();
                    }
                    print(Output::new("recommend", engine.recommend(&request)?))
                }
                Mode::Knn => {
                    let options = KnnOptions {
                        num_recommendations: num,
                        diversity: engine.config().diversity.clamp(0.0, 1.0),
                        filters,
                    };
                    print(Output::new("recommend", engine.recommend_knn(&query, &options)?))
                }
                Mode::Content => {
                    let ranked = engine.content_recommendations(&query, preferences.as_ref(), num)?;
                    print(Output::new("recommend", ranked))
                }
                Mode::Collaborative => {
                    let user = user.context("--mode collaborative needs --user")?;
                    print(Output::new("recommend", engine.collaborative_recommendations(&user, num)?))
                }
            }
        }
        Commands::Match { text } => print(Output::new("match", engine.match_ingredients(&text)?)),
        Commands::Popular { limit } => print(Output::new("popular", engine.popular_recipes(limit)?)),
        Commands::Inspect { vocabulary } => {
            #[derive(Serialize)]
            struct Inspection {
                load: larder::LoadSummary,
                index: Option<larder_core::IndexStats>,
                #[serde(skip_serializing_if = "Option::is_none")]
                vocabulary: Option<Vec<String>>,
            }
            let inspection = Inspection {
                load: summary,
                index: engine.stats(),
                vocabulary: vocabulary.then(|| engine.ingredient_names()),
            };
            print(Output::new("inspect", inspection))
        }
    }
}

fn print<T: Serialize>(output: Output<T>) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &output).context("writing output")?;
    writeln!(out)?;
    Ok(())
}
