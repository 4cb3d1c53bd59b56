//! Deterministic chunking of consolidated records.
//!
//! Chunk boundaries come only from the configured strategy and the input
//! text; there is no randomness, so identical inputs always produce
//! identical chunks.

use crate::aggregation::{ConsolidatedRecord, MergedStatement};
use crate::config::ChunkStrategy;
use crate::types::SectionKind;

/// A bounded span of text awaiting embedding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub section: SectionKind,
    /// Source of the first core statement in the chunk.
    pub source_document_id: String,
}

/// Splits each section of a record into chunks under one strategy.
#[derive(Clone, Debug)]
pub struct Chunker {
    strategy: ChunkStrategy,
}

impl Chunker {
    #[must_use]
    pub fn new(strategy: ChunkStrategy) -> Self {
        Self { strategy }
    }

    /// Chunk every nonempty section in presentation order.
    #[must_use]
    pub fn chunk_record(&self, record: &ConsolidatedRecord) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (kind, section) in record.iter_sections() {
            match &self.strategy {
                ChunkStrategy::SentenceWindow { group_size, overlap } => {
                    self.sentence_windows(kind, &section.statements, *group_size, *overlap, &mut chunks);
                }
                ChunkStrategy::ParagraphBudget { max_tokens } => {
                    self.token_budget(kind, &section.statements, *max_tokens, &mut chunks);
                }
            }
        }
        chunks
    }

    /// Groups of `group_size` sentences stepping by `group_size`, with
    /// `overlap` sentences of surrounding context folded into the text on
    /// each side. Overlap widens the text, not the stride, so every sentence
    /// belongs to exactly one core group.
    fn sentence_windows(
        &self,
        kind: &SectionKind,
        statements: &[MergedStatement],
        group_size: usize,
        overlap: usize,
        out: &mut Vec<Chunk>,
    ) {
        let mut start = 0;
        while start < statements.len() {
            let core_end = (start + group_size).min(statements.len());
            let window_start = start.saturating_sub(overlap);
            let window_end = (core_end + overlap).min(statements.len());
            let text = join_statements(&statements[window_start..window_end]);
            out.push(Chunk {
                text,
                section: kind.clone(),
                source_document_id: statements[start].source_document_id.clone(),
            });
            start = core_end;
        }
    }

    /// Greedy packing of sentences up to a whitespace-token budget. A single
    /// sentence larger than the budget still becomes its own chunk rather
    /// than being dropped.
    fn token_budget(
        &self,
        kind: &SectionKind,
        statements: &[MergedStatement],
        max_tokens: usize,
        out: &mut Vec<Chunk>,
    ) {
        let mut current: Vec<&MergedStatement> = Vec::new();
        let mut current_tokens = 0;
        for statement in statements {
            let tokens = statement.text.split_whitespace().count();
            if !current.is_empty() && current_tokens + tokens > max_tokens {
                out.push(Chunk {
                    text: join_refs(&current),
                    section: kind.clone(),
                    source_document_id: current[0].source_document_id.clone(),
                });
                current.clear();
                current_tokens = 0;
            }
            current.push(statement);
            current_tokens += tokens;
        }
        if !current.is_empty() {
            out.push(Chunk {
                text: join_refs(&current),
                section: kind.clone(),
                source_document_id: current[0].source_document_id.clone(),
            });
        }
    }
}

fn join_statements(statements: &[MergedStatement]) -> String {
    statements
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_refs(statements: &[&MergedStatement]) -> String {
    statements
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
