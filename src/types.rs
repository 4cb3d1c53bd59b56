//! Core domain identifiers shared across the pipeline.
//!
//! This module defines the small closed vocabulary the rest of the crate
//! dispatches on: which entity a record belongs to, which class of entity it
//! is, which kind of section a piece of text came from, and which predicate a
//! relationship edge carries.
//!
//! Section kinds are a closed enum on purpose: merge-policy dispatch in
//! [`crate::aggregation`] matches exhaustively over them, so adding a new
//! section kind forces every policy site to be revisited at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable key identifying one entity (a company ticker or a regulation id).
///
/// Entity ids are immutable once created and double as vector-index document
/// ids, so they must be unique across both entity classes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether an entity is a company under scoring or a regulation to score
/// against. Stored as index metadata so queries can filter on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Company,
    Regulation,
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Company => write!(f, "company"),
            Self::Regulation => write!(f, "regulation"),
        }
    }
}

/// Classifies a document section, driving merge-policy dispatch.
///
/// The ordering is the presentation order of sections within a consolidated
/// record, which is why the enum derives `Ord`. Serde uses the
/// [`encode`](Self::encode)/[`decode`](Self::decode) string form so the kind
/// can serve as a JSON map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKind {
    /// Narrative business description. Latest text wins; genuinely new
    /// sentences from older documents are appended with provenance.
    Business,

    /// Risk-factor statements. Every distinct statement is kept (union
    /// merge); recall is favored over compactness.
    RiskFactors,

    /// Material events (8-K style). Appended strictly in timestamp order,
    /// never overwritten.
    SignificantEvents,

    /// Any section the upstream parser emits that has no dedicated policy.
    /// Merged with the union policy.
    Other(String),
}

impl SectionKind {
    /// Encode a section kind into its persisted string form.
    ///
    /// - `Business` → `"business"`
    /// - `RiskFactors` → `"risk_factors"`
    /// - `SignificantEvents` → `"significant_events"`
    /// - `Other("x")` → `"x"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Business => "business".to_string(),
            Self::RiskFactors => "risk_factors".to_string(),
            Self::SignificantEvents => "significant_events".to_string(),
            Self::Other(name) => name.clone(),
        }
    }

    /// Decode a persisted string form back into a section kind.
    ///
    /// Unknown names fall back to `Other(name)` so new upstream section
    /// labels survive a round trip without data loss.
    pub fn decode(s: &str) -> Self {
        match s {
            "business" => Self::Business,
            "risk_factors" => Self::RiskFactors,
            "significant_events" => Self::SignificantEvents,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for SectionKind {
    fn from(s: &str) -> Self {
        Self::decode(s)
    }
}

impl Serialize for SectionKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for SectionKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::decode(&s))
    }
}

/// Kind tag for a mentioned entity recognized by the upstream extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Location,
    Product,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organization => write!(f, "organization"),
            Self::Location => write!(f, "location"),
            Self::Product => write!(f, "product"),
        }
    }
}

/// Relationship predicate connecting two normalized entity names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    OperatesIn,
    ManufacturesIn,
    SuppliesTo,
    AffectedBy,
    /// Extractor-specific predicate with no dedicated variant.
    Custom(String),
}

impl Predicate {
    /// Encode a predicate into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::OperatesIn => "operates_in".to_string(),
            Self::ManufacturesIn => "manufactures_in".to_string(),
            Self::SuppliesTo => "supplies_to".to_string(),
            Self::AffectedBy => "affected_by".to_string(),
            Self::Custom(s) => s.clone(),
        }
    }

    /// Decode a persisted string form; unknown predicates become `Custom`.
    pub fn decode(s: &str) -> Self {
        match s {
            "operates_in" => Self::OperatesIn,
            "manufactures_in" => Self::ManufacturesIn,
            "supplies_to" => Self::SuppliesTo,
            "affected_by" => Self::AffectedBy,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for Predicate {
    fn from(s: &str) -> Self {
        Self::decode(s)
    }
}
