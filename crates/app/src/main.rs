use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docmatch_core::{FoundRecord, LostRecord, MatchCandidate};
use docmatch_matching::{LogNotifier, MatchEngine, MatchingService};
use docmatch_ocr::{
    run_intake_worker, spawn_intake_watcher, EntityRecognizer, GazetteerRecognizer, ImageDigest, MockEngine, OcrEngine,
    RecognitionCache, RecognitionPipeline, UnavailableEngine,
};
use docmatch_storage::SqliteStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "docmatch")]
#[command(about = "Identity document recognition and lost/found matching")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', global = true, env = "DOCMATCH_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database, overrides `database_path` from the config
    #[arg(long, global = true, env = "DOCMATCH_DB")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize one document image and print the result as JSON
    Recognize {
        image: PathBuf,

        /// Plain-text transcript used as an extra engine (one line per row)
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Print the flat view (ISO dates, empty strings for missing fields)
        #[arg(long)]
        flat: bool,
    },

    /// Watch a folder and recognize every image dropped into it
    Watch { dir: PathBuf },

    /// Score a lost declaration against a found declaration
    Score { lost: PathBuf, found: PathBuf },

    /// Match one declaration against a pool of the opposite kind and
    /// record accepted pairs
    Match {
        /// JSON file holding the new declaration
        item: PathBuf,

        /// JSON array of declarations of the opposite kind
        #[arg(long)]
        pool: PathBuf,

        /// Kind of the new declaration
        #[arg(long, value_enum, default_value = "found")]
        side: Side,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Lost,
    Found,
}

#[derive(Serialize)]
struct MatchReport {
    created: bool,
    candidate: MatchCandidate,
}

#[derive(Serialize)]
struct ScoreReport {
    score: f32,
    accepted: bool,
    criteria: docmatch_core::MatchCriteria,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.database {
        config.database_path = Some(db);
    }

    match cli.command {
        Commands::Recognize { image, transcript, flat } => recognize(&config, &image, transcript.as_deref(), flat).await,
        Commands::Watch { dir } => watch(&config, &dir).await,
        Commands::Score { lost, found } => score(&config, &lost, &found),
        Commands::Match { item, pool, side } => run_match(&config, &item, &pool, side).await,
    }
}

async fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    let path = config.database_path()?;
    SqliteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

/// Engines in priority order: Tesseract when compiled in, then the
/// transcript. With neither, a placeholder keeps the pool well-formed and
/// recognition degrades.
#[cfg_attr(not(feature = "tesseract"), allow(unused_variables))]
fn build_engines(config: &AppConfig, transcript: Option<&Path>) -> Result<Vec<Arc<dyn OcrEngine>>> {
    let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

    #[cfg(feature = "tesseract")]
    {
        use docmatch_ocr::recognizer::tesseract_engine::TesseractEngine;
        let t = &config.tesseract;
        engines.push(Arc::new(TesseractEngine::new(t.data_path.clone(), &t.lang)));
    }

    if let Some(path) = transcript {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        // The name carries a digest of the text, so editing the transcript
        // changes the cache key.
        let digest = ImageDigest::of_bytes(text.as_bytes()).to_hex();
        let name = format!("transcript-{}", &digest[..12]);
        engines.push(Arc::new(MockEngine::from_text(name, &text, 0.9)));
    }

    if engines.is_empty() {
        tracing::warn!("no OCR engine configured; build with --features tesseract or pass --transcript");
        engines.push(Arc::new(UnavailableEngine::new("tesseract")));
    }
    Ok(engines)
}

fn build_pipeline<C: RecognitionCache>(
    config: &AppConfig,
    engines: Vec<Arc<dyn OcrEngine>>,
    cache: C,
) -> RecognitionPipeline<C> {
    let recognizer: Arc<dyn EntityRecognizer> = Arc::new(GazetteerRecognizer::new(&config.gazetteer));
    RecognitionPipeline::new(config.pipeline.clone(), engines, recognizer, cache)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn recognize(config: &AppConfig, image: &Path, transcript: Option<&Path>, flat: bool) -> Result<()> {
    let store = open_store(config).await?;
    let pipeline = build_pipeline(config, build_engines(config, transcript)?, store);

    let result = pipeline
        .recognize_file(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;

    if flat {
        print_json(&result.to_flat())
    } else {
        print_json(&result)
    }
}

async fn watch(config: &AppConfig, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let store = open_store(config).await?;
    let pipeline = Arc::new(build_pipeline(config, build_engines(config, None)?, store));

    // The channel bridges the notify watcher thread and the async worker.
    let (intake_tx, intake_rx) = mpsc::channel::<PathBuf>(64);
    let (results_tx, mut results_rx) = mpsc::channel(16);

    let _watcher = spawn_intake_watcher(dir, intake_tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tokio::spawn(run_intake_worker(pipeline, intake_rx, results_tx));
    tracing::info!(dir = %dir.display(), "watching intake folder");

    loop {
        tokio::select! {
            received = results_rx.recv() => match received {
                Some((path, result)) => {
                    let line = serde_json::json!({ "path": path, "result": result.to_flat() });
                    println!("{line}");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn score(config: &AppConfig, lost: &Path, found: &Path) -> Result<()> {
    let lost: LostRecord = read_json(lost)?;
    let found: FoundRecord = read_json(found)?;
    let engine = MatchEngine::new(config.matching.clone())?;

    let (score, criteria) = engine.score_with_criteria(&lost, &found);
    print_json(&ScoreReport { score, accepted: engine.is_accepted(score), criteria })
}

async fn run_match(config: &AppConfig, item: &Path, pool: &Path, side: Side) -> Result<()> {
    let engine = MatchEngine::new(config.matching.clone())?;
    let service = MatchingService::new(engine, open_store(config).await?, LogNotifier);

    let outcomes = match side {
        Side::Found => {
            let found: FoundRecord = read_json(item)?;
            let lost_pool: Vec<LostRecord> = read_json(pool)?;
            service.match_found_item(&found, &lost_pool).await
        }
        Side::Lost => {
            let lost: LostRecord = read_json(item)?;
            let found_pool: Vec<FoundRecord> = read_json(pool)?;
            service.match_lost_item(&lost, &found_pool).await
        }
    };

    let report: Vec<MatchReport> = outcomes
        .into_iter()
        .map(|o| MatchReport { created: o.is_created(), candidate: o.candidate().clone() })
        .collect();
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_names(config: &AppConfig, transcript: Option<&Path>) -> Vec<String> {
        build_engines(config, transcript).unwrap().iter().map(|e| e.name().to_string()).collect()
    }

    #[test]
    fn transcript_engine_name_follows_its_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("card.txt");
        let config = AppConfig::default();

        std::fs::write(&path, "NOM: DIALLO\nPRÉNOM: AMINATA\n").unwrap();
        let first = engine_names(&config, Some(&path));
        assert_eq!(first, engine_names(&config, Some(&path)));

        std::fs::write(&path, "NOM: SARR\nPRÉNOM: AWA\n").unwrap();
        let edited = engine_names(&config, Some(&path));
        assert_ne!(first, edited);
        assert!(edited.iter().any(|n| n.starts_with("transcript-")));
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn without_engines_recognition_has_a_placeholder() {
        let names = engine_names(&AppConfig::default(), None);
        assert_eq!(names, vec!["tesseract".to_string()]);
        let engines = build_engines(&AppConfig::default(), None).unwrap();
        assert!(!engines[0].is_available());
    }
}
