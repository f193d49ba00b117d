use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use skinmatch::{
    CancelToken, CorpusSnapshot, EngineConfig, InMemoryCatalog, RecommendationQuery, Recommender,
    SkinProfileRecord, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Skin profile similarity and recommendation engine
#[derive(Parser, Debug)]
#[command(name = "skinmatch")]
#[command(about = "Skin profile similarity and recommendation engine", long_about = None)]
struct Args {
    /// Engine configuration (JSON); defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load reference records from JSON and write a corpus snapshot
    Ingest {
        /// JSON array of skin profile records
        #[arg(long)]
        records: PathBuf,

        /// Snapshot file to write
        #[arg(long)]
        out: PathBuf,

        /// Embedding dimension; taken from the config or the first record otherwise
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Run one recommendation against a corpus snapshot and print it as JSON
    Query {
        /// Corpus snapshot written by `ingest`
        #[arg(long)]
        corpus: PathBuf,

        /// JSON array of catalog products
        #[arg(long)]
        catalog: PathBuf,

        /// JSON query: {"vector": [...], "demographics": {...}, "k_final": n}
        #[arg(long)]
        query: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // logs go to stderr so `query` output stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting skinmatch v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Some(
            EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
        ),
        None => None,
    };

    match args.command {
        Command::Ingest {
            records,
            out,
            dimension,
        } => ingest(config, &records, &out, dimension),
        Command::Query {
            corpus,
            catalog,
            query,
        } => run_query(config, &corpus, &catalog, &query).await,
    }
}

fn ingest(
    config: Option<EngineConfig>,
    records_path: &Path,
    out: &Path,
    dimension: Option<usize>,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(records_path)
        .with_context(|| format!("Failed to read records {}", records_path.display()))?;
    let records: Vec<SkinProfileRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse records {}", records_path.display()))?;

    let dimension = match (dimension, &config, records.first()) {
        (Some(dimension), _, _) => dimension,
        (None, Some(config), _) => config.dimension,
        (None, None, Some(first)) => first.vector.dim(),
        (None, None, None) => bail!("No records in {} and no dimension given", records_path.display()),
    };
    let mut store_config = config.unwrap_or_default().store_config();
    store_config.dimension = dimension;

    let store = VectorStore::new(store_config)?;
    let count = store
        .insert_batch(records)
        .with_context(|| format!("Rejected records from {}", records_path.display()))?;
    info!("Ingested {} records of dimension {}", count, dimension);

    let header = CorpusSnapshot::save(&store, out)?;
    info!("Snapshot written to {:?} ({} records)", out, header.record_count);
    Ok(())
}

async fn run_query(
    config: Option<EngineConfig>,
    corpus: &Path,
    catalog_path: &Path,
    query_path: &Path,
) -> anyhow::Result<()> {
    let (config, store) = match config {
        Some(config) => {
            let store = CorpusSnapshot::load_with_config(corpus, config.store_config())?;
            (config, store)
        }
        None => {
            let store = CorpusSnapshot::load(corpus)?;
            let config = EngineConfig {
                dimension: store.dimension(),
                ..EngineConfig::default()
            };
            (config, store)
        }
    };
    info!("Corpus loaded: {} live records", store.len());

    let catalog_json = std::fs::read_to_string(catalog_path)
        .with_context(|| format!("Failed to read catalog {}", catalog_path.display()))?;
    let catalog = InMemoryCatalog::from_json(&catalog_json)?;
    info!("Catalog loaded: {} products", catalog.len());

    let query_json = std::fs::read_to_string(query_path)
        .with_context(|| format!("Failed to read query {}", query_path.display()))?;
    let query: RecommendationQuery = serde_json::from_str(&query_json)
        .with_context(|| format!("Failed to parse query {}", query_path.display()))?;

    let recommender = Recommender::new(Arc::new(store), Arc::new(catalog), &config)?;
    let cancel = CancelToken::new();

    let recommendation = tokio::select! {
        result = recommender.recommend(&query, &cancel) => result?,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    };
    info!("Analysis {} complete", recommendation.analysis_id);

    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}
