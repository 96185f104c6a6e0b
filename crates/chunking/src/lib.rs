mod boundary;
mod fallback;
mod oversized;
mod records;
mod tokenizer;
mod validate;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quire_core::{BoundarySuggestion, ChunkSet, ChunkingError, ChunkingMethod, Document, TokenBudget};
use tracing::debug;

pub use boundary::split_at_offsets;
pub use fallback::{word_window_suggestion, FALLBACK_REASONING, FALLBACK_TOPIC};
pub use oversized::{sentence_units, split_oversized, SENTENCE_DELIMITER};
pub use records::{build_chunk_records, build_chunk_set, chunk_id, topic_for, ChunkSetInput};
pub use tokenizer::{Cl100kTokenizer, Tokenizer, WhitespaceTokenizer};
pub use validate::{validate_and_repair, RepairOutcome, RepairStats};

#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    pub chunk_set: ChunkSet,
    pub suggestion: BoundarySuggestion,
    pub method: ChunkingMethod,
    pub stats: RepairStats,
}

#[derive(Clone)]
pub struct Chunker {
    budget: TokenBudget,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Chunker {
    pub fn new(budget: TokenBudget, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { budget, tokenizer }
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count_tokens(text)
    }

    pub fn fallback_suggestion(&self, text: &str) -> BoundarySuggestion {
        word_window_suggestion(text, self.budget)
    }

    pub fn chunk_text(&self, text: &str, offsets: &[usize]) -> Result<RepairOutcome, ChunkingError> {
        let segments = split_at_offsets(text, offsets)?;
        validate_and_repair(segments, self.budget, self.tokenizer.as_ref())
    }

    pub fn chunk_document(
        &self,
        document: &Document,
        suggestion: Option<BoundarySuggestion>,
        processed_at: DateTime<Utc>,
    ) -> Result<ChunkedDocument, ChunkingError> {
        let combined = document.combined_text()?;
        let char_len = combined.chars().count();

        let usable = suggestion.and_then(|suggestion| {
            let offsets = suggestion.normalized_offsets(char_len);
            (!offsets.is_empty()).then_some((suggestion, offsets))
        });

        let (suggestion, offsets, method) = match usable {
            Some((suggestion, offsets)) => (suggestion, offsets, ChunkingMethod::Suggested),
            None => {
                let fallback = self.fallback_suggestion(&combined);
                let offsets = fallback.suggested_splits.clone();
                (fallback, offsets, ChunkingMethod::WordWindow)
            }
        };

        debug!(
            filename = %document.filename,
            offsets = offsets.len(),
            method = method.as_tag(),
            "splitting combined document text"
        );

        let outcome = self.chunk_text(&combined, &offsets)?;
        let chunk_set = build_chunk_set(
            ChunkSetInput {
                filename: &document.filename,
                chunks: &outcome.chunks,
                topics: &suggestion.topics,
                method,
                budget: self.budget,
                processed_at,
            },
            self.tokenizer.as_ref(),
        );

        Ok(ChunkedDocument {
            chunk_set,
            suggestion,
            method,
            stats: outcome.stats,
        })
    }
}
