//! File ingestion for the `larder` binary: corpus and rating files in JSON
//! or JSONL, single files or whole directories, and the engine config.

use anyhow::{Context, Result};
use larder_core::{EngineConfig, LedgerLoadReport, RatingEntry, RecipeRecord, RecommendationEngine, ReloadReport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "LARDER_CONFIG";

/// Records read from one or more files, plus the count of entries that did
/// not parse.
#[derive(Debug)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub skipped: usize,
    pub files: usize,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self { items: Vec::new(), skipped: 0, files: 0 }
    }
}

/// `.json` and `.jsonl` files under `input`, in path order. A plain file is
/// returned as-is whatever its extension.
pub fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("input path {} does not exist", input.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    Ok(files)
}

fn is_jsonl(file: &Path) -> bool {
    file.extension().and_then(|s| s.to_str()) == Some("jsonl")
}

/// Read every entry of type `T` under `input`. Unparsable lines and array
/// elements are skipped and counted; unreadable files are errors.
pub fn read_entries<T: DeserializeOwned>(input: &Path) -> Result<Loaded<T>> {
    let mut loaded = Loaded::default();
    for file in collect_files(input)? {
        if is_jsonl(&file) {
            read_jsonl(&file, &mut loaded)?;
        } else {
            read_json(&file, &mut loaded)?;
        }
        loaded.files += 1;
    }
    tracing::info!(
        input = %input.display(),
        files = loaded.files,
        entries = loaded.items.len(),
        skipped = loaded.skipped,
        "read input"
    );
    Ok(loaded)
}

fn read_jsonl<T: DeserializeOwned>(file: &Path, loaded: &mut Loaded<T>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(item) => loaded.items.push(item),
            Err(err) => {
                tracing::warn!(file = %file.display(), line = n + 1, error = %err, "skipping unparsable line");
                loaded.skipped += 1;
            }
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(file: &Path, loaded: &mut Loaded<T>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: serde_json::Value =
        serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))?;
    let values = match json {
        serde_json::Value::Array(values) => values,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            tracing::warn!(file = %file.display(), "expected a JSON array or object");
            loaded.skipped += 1;
            return Ok(());
        }
    };
    for v in values {
        match serde_json::from_value::<T>(v) {
            Ok(item) => loaded.items.push(item),
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "skipping unparsable entry");
                loaded.skipped += 1;
            }
        }
    }
    Ok(())
}

pub fn read_corpus(input: &Path) -> Result<Loaded<RecipeRecord>> {
    read_entries(input)
}

pub fn read_ratings(input: &Path) -> Result<Loaded<RatingEntry>> {
    read_entries(input)
}

/// Config from `path`, or defaults when no file is given. Missing fields
/// take their defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// What went into a freshly built engine.
#[derive(Debug, Serialize)]
pub struct LoadSummary {
    pub corpus: ReloadReport,
    /// Corpus entries that were not even valid JSON records.
    pub unparsable: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<LedgerLoadReport>,
}

/// Build an engine from a corpus path and an optional rating ledger path.
pub fn build_engine(
    config: EngineConfig,
    corpus: &Path,
    ratings: Option<&Path>,
) -> Result<(RecommendationEngine, LoadSummary)> {
    let engine = RecommendationEngine::new(config).context("invalid engine configuration")?;
    let records = read_corpus(corpus)?;
    let report = engine
        .reload_corpus(records.items)
        .with_context(|| format!("building index from {}", corpus.display()))?;
    let ratings = match ratings {
        Some(path) => {
            let entries = read_ratings(path)?;
            let mut report = engine.load_ratings(entries.items);
            report.skipped += entries.skipped;
            Some(report)
        }
        None => None,
    };
    let summary = LoadSummary { corpus: report, unparsable: records.skipped, ratings };
    Ok((engine, summary))
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub k: Option<usize>,
    pub metric: Option<String>,
    pub diversity: Option<f32>,
}

impl Overrides {
    pub fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(metric) = &self.metric {
            config.metric = metric.clone();
        }
        if let Some(diversity) = self.diversity {
            config.diversity = diversity;
        }
        config
    }
}

/// Envelope printed on stdout for every command.
#[derive(Debug, Serialize)]
pub struct Output<T: Serialize> {
    pub generated_at: String,
    pub command: &'static str,
    pub result: T,
}

impl<T: Serialize> Output<T> {
    pub fn new(command: &'static str, result: T) -> Self {
        let generated_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { generated_at, command, result }
    }
}
