//! Relationship graph built from extracted triples.
//!
//! Cyclic company↔country↔product structures are stored as an adjacency list
//! keyed by normalized subject name. Edges reference their object by name
//! rather than holding the node, so cycles cost nothing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::Predicate;

/// Weight added for each novel source document observing a relationship.
/// A repeat observation from an already-seen source contributes nothing.
pub const NOVELTY_INCREMENT: f32 = 0.2;

/// One directed edge with its accumulated evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub predicate: Predicate,
    /// Normalized object name.
    pub object: String,
    /// Confidence in [0,1], grown per novel source, capped at 1.0.
    pub weight: f32,
    /// Source document ids that evidenced this edge, in observation order.
    pub evidence: Vec<String>,
    /// Set view of `evidence` for novelty checks.
    sources: BTreeSet<String>,
}

impl RelationshipEdge {
    fn new(predicate: Predicate, object: String) -> Self {
        Self {
            predicate,
            object,
            weight: 0.0,
            evidence: Vec::new(),
            sources: BTreeSet::new(),
        }
    }

    /// Record one observation. Returns `true` when the source was novel.
    fn observe(&mut self, source_document_id: &str) -> bool {
        if !self.sources.insert(source_document_id.to_string()) {
            return false;
        }
        self.evidence.push(source_document_id.to_string());
        self.weight = (self.weight + NOVELTY_INCREMENT).min(1.0);
        true
    }
}

/// Adjacency list over normalized entity names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: BTreeMap<String, Vec<RelationshipEdge>>,
}

impl RelationshipGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation of `(subject, predicate, object)` evidenced by
    /// one source document. Idempotent per source: re-observing from the same
    /// source neither duplicates evidence nor moves the weight.
    pub fn observe(
        &mut self,
        subject: &str,
        predicate: Predicate,
        object: &str,
        source_document_id: &str,
    ) {
        let outgoing = self.edges.entry(subject.to_string()).or_default();
        match outgoing
            .iter_mut()
            .find(|e| e.predicate == predicate && e.object == object)
        {
            Some(edge) => {
                edge.observe(source_document_id);
            }
            None => {
                let mut edge = RelationshipEdge::new(predicate, object.to_string());
                edge.observe(source_document_id);
                outgoing.push(edge);
            }
        }
    }

    /// Outgoing edges for a subject, if any.
    #[must_use]
    pub fn outgoing(&self, subject: &str) -> Option<&[RelationshipEdge]> {
        self.edges.get(subject).map(Vec::as_slice)
    }

    /// Iterate all `(subject, edge)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationshipEdge)> {
        self.edges
            .iter()
            .flat_map(|(subject, edges)| edges.iter().map(move |e| (subject.as_str(), e)))
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Normalized object names reachable through the given predicate, across
    /// all subjects. Used to derive region exposure.
    #[must_use]
    pub fn objects_of(&self, predicate: &Predicate) -> BTreeSet<String> {
        self.iter()
            .filter(|(_, e)| &e.predicate == predicate)
            .map(|(_, e)| e.object.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novel_sources_grow_weight_capped_at_one() {
        let mut graph = RelationshipGraph::new();
        for i in 0..7 {
            graph.observe("apple", Predicate::OperatesIn, "china", &format!("doc-{i}"));
        }
        let edge = &graph.outgoing("apple").unwrap()[0];
        assert_eq!(edge.weight, 1.0);
        assert_eq!(edge.evidence.len(), 7);
    }

    #[test]
    fn repeat_source_is_a_no_op() {
        let mut graph = RelationshipGraph::new();
        graph.observe("apple", Predicate::OperatesIn, "china", "doc-1");
        let weight = graph.outgoing("apple").unwrap()[0].weight;
        graph.observe("apple", Predicate::OperatesIn, "china", "doc-1");
        let edge = &graph.outgoing("apple").unwrap()[0];
        assert_eq!(edge.weight, weight);
        assert_eq!(edge.evidence, vec!["doc-1"]);
    }

    #[test]
    fn distinct_predicates_are_distinct_edges() {
        let mut graph = RelationshipGraph::new();
        graph.observe("apple", Predicate::OperatesIn, "china", "doc-1");
        graph.observe("apple", Predicate::ManufacturesIn, "china", "doc-1");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn cycles_are_representable() {
        let mut graph = RelationshipGraph::new();
        graph.observe("apple", Predicate::SuppliesTo, "foxconn", "doc-1");
        graph.observe("foxconn", Predicate::SuppliesTo, "apple", "doc-1");
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.outgoing("foxconn").is_some());
    }

    #[test]
    fn objects_of_collects_across_subjects() {
        let mut graph = RelationshipGraph::new();
        graph.observe("apple", Predicate::OperatesIn, "china", "doc-1");
        graph.observe("apple", Predicate::OperatesIn, "germany", "doc-1");
        graph.observe("subsidiary", Predicate::OperatesIn, "japan", "doc-2");
        let regions = graph.objects_of(&Predicate::OperatesIn);
        assert_eq!(regions.len(), 3);
        assert!(regions.contains("germany"));
    }
}
