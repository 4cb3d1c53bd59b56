//! The risk scorer.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::{ScoreNormalization, ScoringConfig};
use crate::embedding::{ChunkEmbedding, DocumentEmbedding};
use crate::errors::PipelineError;
use crate::index::{IndexMatch, MetadataFilter, MetadataValue, VectorIndex};
use crate::scoring::financial::FinancialMetrics;
use crate::scoring::profile::{ContributingFactor, Recommendation, RiskProfile};

const SNIPPET_MAX_CHARS: usize = 240;

/// Everything the scorer needs to know about one company.
#[derive(Clone, Debug)]
pub struct ScoringInput {
    pub document: DocumentEmbedding,
    /// The company's chunk vectors, used to locate the company-side text
    /// nearest each matched regulation for explainability.
    pub chunks: Vec<ChunkEmbedding>,
    pub sector: Option<String>,
    /// Normalized region names the company is exposed to.
    pub regions: BTreeSet<String>,
    pub financial: FinancialMetrics,
    /// Restrict candidate regulations to one sector.
    pub sector_filter: Option<String>,
}

struct ScoredMatch {
    regulation_id: String,
    similarity: f32,
    impact: f32,
    sector: Option<String>,
    effective_date: Option<NaiveDate>,
}

/// Computes one [`RiskProfile`] per company from the vector index.
pub struct RiskScorer {
    index: Arc<dyn VectorIndex>,
    config: ScoringConfig,
}

impl RiskScorer {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, config: ScoringConfig) -> Self {
        Self { index, config }
    }

    /// Score one company against the indexed regulations.
    ///
    /// Zero matched regulations is a normal outcome: score 0, neutral
    /// recommendation, empty factor list.
    #[instrument(skip(self, input), fields(entity_id = %input.document.entity_id), err)]
    pub async fn score(&self, input: &ScoringInput) -> Result<RiskProfile, PipelineError> {
        let filter = self.regulation_filter(input.sector_filter.as_deref());
        let matches = self
            .index
            .query(&input.document.vector, self.config.top_k, Some(&filter))
            .await?;

        let health = input.financial.health_factor();
        let scored: Vec<ScoredMatch> = matches
            .iter()
            .filter(|m| m.score >= self.config.min_similarity)
            .map(|m| self.score_match(m, input, health))
            .collect();

        if scored.is_empty() {
            debug!(entity_id = %input.document.entity_id, "no regulations above similarity floor");
            return Ok(RiskProfile::empty(
                input.document.entity_id.clone(),
                self.config.normalization,
            ));
        }

        let total: f32 = scored.iter().map(|m| m.impact).sum();
        let risk_score = self.normalize(total);
        let mut recommendation = Recommendation::from_score(risk_score);
        if matches!(recommendation, Recommendation::Trim | Recommendation::Sell)
            && self.rotation_applies(&scored)
        {
            recommendation = Recommendation::Rotate;
        }

        let snippets = self.nearest_chunk_snippets(input).await?;
        let contributing_factors = self.rank_factors(scored, &snippets, input);

        Ok(RiskProfile {
            entity_id: input.document.entity_id.clone(),
            risk_score,
            contributing_factors,
            recommendation,
            normalization: self.config.normalization,
            generated_at: chrono::Utc::now(),
        })
    }

    /// Constrain matches to regulation document vectors; chunk entries share
    /// the class tag but carry `kind = "chunk"`.
    fn regulation_filter(&self, sector: Option<&str>) -> MetadataFilter {
        let mut filter = MetadataFilter::new();
        filter.insert("class".to_string(), MetadataValue::from("regulation"));
        filter.insert("kind".to_string(), MetadataValue::from("document"));
        if let Some(sector) = sector {
            filter.insert("sector".to_string(), MetadataValue::from(sector));
        }
        filter
    }

    fn score_match(&self, m: &IndexMatch, input: &ScoringInput, health: f32) -> ScoredMatch {
        let w = &self.config.weights;
        let similarity = m.score.clamp(0.0, 1.0);
        let reg_sector = string_meta(m, "sector");
        let sector_match = match (&input.sector, &reg_sector) {
            (Some(company), Some(regulation)) if company.eq_ignore_ascii_case(regulation) => 1.0,
            _ => 0.0,
        };
        let region_exposure = match string_meta(m, "jurisdiction") {
            // No jurisdiction on the regulation: neutral exposure.
            None => 0.5,
            Some(jurisdiction) => {
                if input.regions.is_empty() {
                    0.5
                } else if input.regions.contains(&jurisdiction.to_lowercase()) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        let impact = similarity * w.similarity
            + sector_match * w.sector
            + region_exposure * w.region
            + (1.0 - health) * w.financial;
        ScoredMatch {
            regulation_id: m.id.clone(),
            similarity,
            impact,
            sector: reg_sector,
            effective_date: string_meta(m, "effective_date").and_then(|d| d.parse().ok()),
        }
    }

    fn normalize(&self, sum: f32) -> f32 {
        let score = match self.config.normalization {
            ScoreNormalization::SaturatingExp => 1.0 - (-sum).exp(),
            ScoreNormalization::MinMax { lo, hi } => (sum - lo) / (hi - lo),
        };
        score.clamp(0.0, 1.0)
    }

    /// Secondary pass: partition matched regulations by sector and compare
    /// partition scores. A margin-sized gap means the risk is concentrated
    /// and rotating beats an across-the-board trim/sell.
    fn rotation_applies(&self, scored: &[ScoredMatch]) -> bool {
        let mut partitions: FxHashMap<&str, f32> = FxHashMap::default();
        for m in scored {
            let key = m.sector.as_deref().unwrap_or("unclassified");
            *partitions.entry(key).or_default() += m.impact;
        }
        if partitions.len() < 2 {
            return false;
        }
        let scores: Vec<f32> = partitions.values().map(|sum| self.normalize(*sum)).collect();
        let max = scores.iter().cloned().fold(f32::MIN, f32::max);
        let min = scores.iter().cloned().fold(f32::MAX, f32::min);
        max - min >= self.config.rotate_margin
    }

    /// For each regulation that any company chunk retrieves, remember the
    /// chunk with the highest similarity. That chunk's text explains *why*
    /// the company matched the regulation.
    async fn nearest_chunk_snippets(
        &self,
        input: &ScoringInput,
    ) -> Result<FxHashMap<String, (f32, String)>, PipelineError> {
        let filter = self.regulation_filter(None);
        let mut best: FxHashMap<String, (f32, String)> = FxHashMap::default();
        for chunk in &input.chunks {
            let matches = self
                .index
                .query(&chunk.vector, self.config.top_k, Some(&filter))
                .await?;
            for m in matches {
                let entry = best.entry(m.id).or_insert((f32::MIN, String::new()));
                if m.score > entry.0 {
                    *entry = (m.score, chunk.text.clone());
                }
            }
        }
        Ok(best)
    }

    fn rank_factors(
        &self,
        mut scored: Vec<ScoredMatch>,
        snippets: &FxHashMap<String, (f32, String)>,
        input: &ScoringInput,
    ) -> Vec<ContributingFactor> {
        // Impact descending; ties broken by most recent effective date.
        scored.sort_by(|a, b| {
            b.impact
                .partial_cmp(&a.impact)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.effective_date.cmp(&a.effective_date))
                .then_with(|| a.regulation_id.cmp(&b.regulation_id))
        });
        scored
            .into_iter()
            .take(self.config.top_factors)
            .map(|m| {
                let snippet = snippets
                    .get(&m.regulation_id)
                    .map(|(_, text)| text.as_str())
                    .or_else(|| input.chunks.first().map(|c| c.text.as_str()))
                    .unwrap_or_default();
                ContributingFactor {
                    regulation_id: m.regulation_id,
                    similarity: m.similarity,
                    impact: m.impact,
                    text_snippet: truncate_snippet(snippet),
                }
            })
            .collect()
    }
}

fn string_meta(m: &IndexMatch, key: &str) -> Option<String> {
    match m.metadata.get(key) {
        Some(MetadataValue::Str(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    format!("{truncated}…")
}
