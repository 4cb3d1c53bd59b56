//! Composite regulatory-risk scoring.
//!
//! For one company the scorer retrieves the closest indexed regulations,
//! weighs each match by similarity, sector overlap, region exposure, and
//! financial resilience, then folds the per-regulation impacts into a single
//! [0,1] score with an explicit recommendation and ranked explainability.

pub mod financial;
pub mod profile;
pub mod scorer;

pub use financial::FinancialMetrics;
pub use profile::{ContributingFactor, Recommendation, RiskProfile};
pub use scorer::{RiskScorer, ScoringInput};
