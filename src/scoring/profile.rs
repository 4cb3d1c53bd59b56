//! Risk profile output types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScoreNormalization;
use crate::types::EntityId;

/// Discretized action label derived from the composite score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Buy,
    Neutral,
    Trim,
    Sell,
    /// High risk concentrated in one sector/region partition while another
    /// partition scores materially lower.
    Rotate,
}

impl Recommendation {
    /// Threshold classification of the normalized score.
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        if score < 0.3 {
            Self::Buy
        } else if score < 0.6 {
            Self::Neutral
        } else if score < 0.8 {
            Self::Trim
        } else {
            Self::Sell
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Buy => "buy",
            Self::Neutral => "neutral",
            Self::Trim => "trim",
            Self::Sell => "sell",
            Self::Rotate => "rotate",
        };
        write!(f, "{label}")
    }
}

/// One regulation's contribution, with the company-side text that drove it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub regulation_id: String,
    pub similarity: f32,
    pub impact: f32,
    /// Snippet of the company chunk nearest to this regulation.
    pub text_snippet: String,
}

/// Derived, ephemeral scoring output; never authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub entity_id: EntityId,
    /// Composite score in [0,1].
    pub risk_score: f32,
    /// Ranked by impact, highest first.
    pub contributing_factors: Vec<ContributingFactor>,
    pub recommendation: Recommendation,
    /// Normalization that produced `risk_score`; profiles computed under
    /// different normalizations are not comparable.
    pub normalization: ScoreNormalization,
    pub generated_at: DateTime<Utc>,
}

impl RiskProfile {
    /// Profile for a company with no matched regulations.
    #[must_use]
    pub fn empty(entity_id: EntityId, normalization: ScoreNormalization) -> Self {
        Self {
            entity_id,
            risk_score: 0.0,
            contributing_factors: Vec::new(),
            recommendation: Recommendation::Neutral,
            normalization,
            generated_at: Utc::now(),
        }
    }
}
