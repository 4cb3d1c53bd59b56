//! Pipeline configuration.
//!
//! Configuration is resolved once at startup (explicit values win over
//! `LEXRISK_*` environment variables, which win over defaults) and is fixed
//! for the lifetime of a run. Chunking and enrichment settings are recorded
//! in embedding provenance so downstream consumers can tell which
//! configuration produced a given vector.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// How consolidated text is split into chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum ChunkStrategy {
    /// Group `group_size` sentences per chunk with `overlap` sentences of
    /// context carried over on each side.
    SentenceWindow { group_size: usize, overlap: usize },
    /// Paragraph-bounded chunks capped at `max_tokens` whitespace tokens;
    /// oversized paragraphs are split at sentence boundaries.
    ParagraphBudget { max_tokens: usize },
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::SentenceWindow {
            group_size: 4,
            overlap: 1,
        }
    }
}

/// Embedding model, dimension, and chunking settings fixed per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier. Changing it invalidates every stored vector.
    pub model: String,
    /// Fixed vector dimension for the lifetime of the index.
    pub dimension: usize,
    pub chunking: ChunkStrategy,
    /// When set, each chunk is prefixed with a short sector/jurisdiction
    /// sentence before vectorization. Tracked in provenance; an index must
    /// never mix enriched and unenriched vectors.
    pub contextual_enrichment: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            chunking: ChunkStrategy::default(),
            contextual_enrichment: false,
        }
    }
}

/// Monotonic map from summed per-regulation impacts to the final [0,1] score.
///
/// The active mode is recorded in every emitted profile since it affects
/// cross-run comparability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ScoreNormalization {
    /// `1 - exp(-sum)`. Batch-independent, saturates smoothly.
    SaturatingExp,
    /// Linear rescale of `sum` from `[lo, hi]` into [0,1], clamped. The
    /// range is configured per run, typically from a prior batch's observed
    /// spread.
    MinMax { lo: f32, hi: f32 },
}

impl Default for ScoreNormalization {
    fn default() -> Self {
        Self::SaturatingExp
    }
}

/// Per-factor weights in the impact formula.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub similarity: f32,
    pub sector: f32,
    pub region: f32,
    pub financial: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            sector: 0.2,
            region: 0.2,
            financial: 0.1,
        }
    }
}

/// Risk-scorer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Regulations with similarity below this never contribute.
    pub min_similarity: f32,
    /// How many index matches to consider per company.
    pub top_k: usize,
    /// How many contributing factors to surface in the profile.
    pub top_factors: usize,
    pub normalization: ScoreNormalization,
    /// Minimum normalized-score delta between sector partitions before a
    /// trim/sell recommendation is upgraded to rotate.
    pub rotate_margin: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_similarity: 0.7,
            top_k: 50,
            top_factors: 5,
            normalization: ScoreNormalization::default(),
            rotate_margin: 0.25,
        }
    }
}

/// Retry behavior for transient backend failures.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
    pub retry: RetryConfig,
    /// Entities processed concurrently. Each entity's three stages still run
    /// strictly sequentially within its slot.
    pub parallelism: usize,
    /// Progress is logged once per this many completed entities.
    pub progress_every: usize,
    /// Seconds a cached enrichment value stays fresh.
    pub cache_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            scoring: ScoringConfig::default(),
            retry: RetryConfig::default(),
            parallelism: 4,
            progress_every: 10,
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from defaults overridden by `LEXRISK_*`
    /// environment variables (a `.env` file is honored when present).
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(model) = read_env("LEXRISK_EMBED_MODEL") {
            config.embedding.model = model;
        }
        if let Some(dim) = read_env("LEXRISK_EMBED_DIM") {
            config.embedding.dimension = parse_var("LEXRISK_EMBED_DIM", &dim)?;
        }
        if let Some(enrich) = read_env("LEXRISK_ENRICHMENT") {
            config.embedding.contextual_enrichment = parse_var("LEXRISK_ENRICHMENT", &enrich)?;
        }
        if let Some(k) = read_env("LEXRISK_TOP_K") {
            config.scoring.top_k = parse_var("LEXRISK_TOP_K", &k)?;
        }
        if let Some(sim) = read_env("LEXRISK_MIN_SIMILARITY") {
            config.scoring.min_similarity = parse_var("LEXRISK_MIN_SIMILARITY", &sim)?;
        }
        if let Some(attempts) = read_env("LEXRISK_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("LEXRISK_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(par) = read_env("LEXRISK_PARALLELISM") {
            config.parallelism = parse_var("LEXRISK_PARALLELISM", &par)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would corrupt the index or stall the run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.embedding.dimension == 0 {
            return Err(PipelineError::Config(
                "embedding dimension must be nonzero".to_string(),
            ));
        }
        if self.parallelism == 0 {
            return Err(PipelineError::Config(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.scoring.top_k == 0 {
            return Err(PipelineError::Config("top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.scoring.min_similarity) {
            return Err(PipelineError::Config(
                "min_similarity must lie in [0, 1]".to_string(),
            ));
        }
        if let ScoreNormalization::MinMax { lo, hi } = self.scoring.normalization {
            if hi <= lo {
                return Err(PipelineError::Config(
                    "min-max normalization requires hi > lo".to_string(),
                ));
            }
        }
        match self.embedding.chunking {
            ChunkStrategy::SentenceWindow { group_size, overlap } => {
                if group_size == 0 {
                    return Err(PipelineError::Config(
                        "sentence window group_size must be at least 1".to_string(),
                    ));
                }
                if overlap >= group_size {
                    return Err(PipelineError::Config(
                        "sentence window overlap must be smaller than group_size".to_string(),
                    ));
                }
            }
            ChunkStrategy::ParagraphBudget { max_tokens } => {
                if max_tokens == 0 {
                    return Err(PipelineError::Config(
                        "paragraph budget max_tokens must be at least 1".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, PipelineError> {
    value
        .parse()
        .map_err(|_| PipelineError::Config(format!("invalid value {value:?} for {name}")))
}
