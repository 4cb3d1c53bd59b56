//! Identity and text normalization used by dedup and graph construction.

use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use unicode_segmentation::UnicodeSegmentation;

/// Canonical-name lookup for entity identity normalization.
///
/// Keys are stored in normalized form so `"U.S."` and `"us"` resolve to the
/// same canonical name once an alias is registered for either spelling.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    aliases: FxHashMap<String, String>,
}

impl AliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an alias → canonical-name mapping.
    #[must_use]
    pub fn with_alias(mut self, alias: impl AsRef<str>, canonical: impl Into<String>) -> Self {
        self.aliases
            .insert(fold_identity(alias.as_ref()), canonical.into());
        self
    }

    /// Normalize a raw entity name: case-fold, strip punctuation, collapse
    /// whitespace, then resolve through the alias table.
    #[must_use]
    pub fn normalize(&self, name: &str) -> String {
        let folded = fold_identity(name);
        match self.aliases.get(&folded) {
            Some(canonical) => fold_identity(canonical),
            None => folded,
        }
    }
}

/// Case-fold and strip punctuation, collapsing runs of whitespace.
fn fold_identity(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Stable hash of a statement's normalized text, used for dedup.
///
/// Two statements differing only in case, punctuation, or whitespace hash
/// identically.
#[must_use]
pub fn statement_hash(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    fold_identity(text).hash(&mut hasher);
    hasher.finish()
}

/// Split text into sentences using Unicode sentence boundaries, dropping
/// whitespace-only fragments. Deterministic for identical input.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
