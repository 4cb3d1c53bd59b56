//! Batch-run command line entry point.
//!
//! Thin shell over [`lexrisk::batch::BatchOrchestrator`]: resolves the entity
//! list, wires the configured backends (falling back to in-process
//! implementations when no endpoints are given), runs the batch, writes the
//! summary JSON, and exits nonzero when any entity ended in fatal failure.

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lexrisk::aggregation::{EntityAggregator, FsMetadataCache};
use lexrisk::batch::{BatchOrchestrator, EntityOutcome, FsCheckpointStore};
use lexrisk::config::PipelineConfig;
use lexrisk::documents::FsDocumentSource;
use lexrisk::embedding::{DocumentEmbedder, Embedder, HashEmbedder, HttpEmbedder};
use lexrisk::index::{HttpVectorIndex, InMemoryVectorIndex, VectorIndex};
use lexrisk::types::{EntityClass, EntityId};

#[derive(Parser, Debug)]
#[command(name = "lexrisk", about = "Aggregate, embed, and index entities in bulk")]
struct Args {
    /// Comma-separated entity ids (e.g. "AAPL,MSFT,EU_AI_ACT").
    #[arg(long, conflicts_with = "entities_csv")]
    entities: Option<String>,

    /// CSV file whose first column holds entity ids; a header row named
    /// "entity_id" or "ticker" is skipped.
    #[arg(long)]
    entities_csv: Option<PathBuf>,

    /// Directory of per-entity document JSON files.
    #[arg(long, default_value = "documents")]
    documents: PathBuf,

    /// Checkpoint file path.
    #[arg(long, default_value = "lexrisk-checkpoint.json")]
    checkpoint: PathBuf,

    /// Ignore any existing checkpoint and start fresh.
    #[arg(long)]
    no_resume: bool,

    /// Where the summary JSON is written.
    #[arg(long, default_value = "lexrisk-results.json")]
    output: PathBuf,

    /// Entity class for this run.
    #[arg(long, value_parser = parse_class, default_value = "company")]
    class: EntityClass,

    /// OpenAI-compatible embeddings endpoint. Without it a deterministic
    /// offline embedder is used.
    #[arg(long)]
    embedder_url: Option<String>,

    /// Vector-index service endpoint. Without it vectors stay in process,
    /// which is only useful for dry runs.
    #[arg(long)]
    index_url: Option<String>,

    /// Optional enrichment cache file.
    #[arg(long)]
    enrichment_cache: Option<PathBuf>,
}

fn parse_class(s: &str) -> Result<EntityClass, String> {
    match s {
        "company" => Ok(EntityClass::Company),
        "regulation" => Ok(EntityClass::Regulation),
        other => Err(format!("unknown entity class {other:?}")),
    }
}

fn resolve_entities(args: &Args) -> miette::Result<Vec<EntityId>> {
    if let Some(list) = &args.entities {
        let ids: Vec<EntityId> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EntityId::from)
            .collect();
        return Ok(ids);
    }
    let Some(path) = &args.entities_csv else {
        miette::bail!("provide --entities or --entities-csv");
    };
    let raw = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading entity CSV {}", path.display()))?;
    let ids = raw
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| !matches!(s.to_ascii_lowercase().as_str(), "entity_id" | "ticker"))
        .map(EntityId::from)
        .collect();
    Ok(ids)
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = PipelineConfig::from_env()?;
    let entity_ids = resolve_entities(&args)?;
    if entity_ids.is_empty() {
        miette::bail!("entity list is empty");
    }
    info!(entities = entity_ids.len(), class = %args.class, "starting batch run");

    let embedder: Arc<dyn Embedder> = match &args.embedder_url {
        Some(url) => Arc::new(HttpEmbedder::new(
            url.clone(),
            config.embedding.model.clone(),
            config.embedding.dimension,
        )?),
        None => Arc::new(HashEmbedder::new(config.embedding.dimension)),
    };
    let index: Arc<dyn VectorIndex> = match &args.index_url {
        Some(url) => Arc::new(HttpVectorIndex::new(url.clone(), config.embedding.dimension)?),
        None => Arc::new(InMemoryVectorIndex::new(config.embedding.dimension)),
    };

    let mut aggregator = EntityAggregator::new();
    if let Some(cache_path) = &args.enrichment_cache {
        aggregator =
            aggregator.with_cache(Arc::new(FsMetadataCache::new(cache_path, config.cache_ttl_secs)));
    }

    let orchestrator = BatchOrchestrator::new(
        Arc::new(FsDocumentSource::new(&args.documents)),
        Arc::new(aggregator),
        Arc::new(
            DocumentEmbedder::new(embedder, config.embedding.clone()).with_retry(config.retry),
        ),
        index,
        Arc::new(FsCheckpointStore::new(&args.checkpoint)),
        config,
    )
    .with_class(args.class);

    let summary = orchestrator.run(entity_ids, !args.no_resume).await?;

    let serialized = serde_json::to_string_pretty(&summary).into_diagnostic()?;
    std::fs::write(&args.output, serialized)
        .into_diagnostic()
        .wrap_err_with(|| format!("writing summary to {}", args.output.display()))?;
    println!(
        "total {} | successful {} | failed {} | skipped {}",
        summary.total, summary.successful, summary.failed, summary.skipped
    );
    for result in &summary.results {
        if let EntityOutcome::FailedFatal { error } | EntityOutcome::FailedExhausted { error, .. } =
            &result.outcome
        {
            eprintln!("  {}: {}", result.entity_id, error);
        }
    }

    let fatal = summary
        .results
        .iter()
        .any(|r| matches!(r.outcome, EntityOutcome::FailedFatal { .. }));
    if fatal {
        std::process::exit(1);
    }
    Ok(())
}
