use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("document {0} has no extractable content")]
    EmptyDocument(String),
    #[error("no raw segments reached the validator; refusing to produce an empty chunk set")]
    NoSegments,
    #[error("invalid token budget: min_tokens={min} max_tokens={max}")]
    InvalidBudget { min: usize, max: usize },
    #[error("boundary offset {offset} at position {index} precedes offset {previous}")]
    MalformedOffsets {
        index: usize,
        offset: usize,
        previous: usize,
    },
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),
}
