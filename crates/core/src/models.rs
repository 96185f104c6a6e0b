use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TOPIC: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkingMethod {
    #[serde(rename = "agentic_llm")]
    Suggested,
    #[serde(rename = "fallback_word_window")]
    WordWindow,
}

impl ChunkingMethod {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Suggested => "agentic_llm",
            Self::WordWindow => "fallback_word_window",
        }
    }

    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim() {
            "agentic_llm" => Some(Self::Suggested),
            "fallback_word_window" => Some(Self::WordWindow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub pages: Vec<PageText>,
}

impl Document {
    pub fn new(filename: impl Into<String>, pages: Vec<PageText>) -> Self {
        Self {
            filename: filename.into(),
            pages,
        }
    }

    pub fn document_name(&self) -> String {
        crate::document::document_name(&self.filename)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundarySuggestion {
    #[serde(default)]
    pub suggested_splits: Vec<usize>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub reasoning: Vec<String>,
}

impl BoundarySuggestion {
    /// Sorted, deduplicated offsets strictly inside `(0, char_len)`.
    pub fn normalized_offsets(&self, char_len: usize) -> Vec<usize> {
        let mut offsets = self
            .suggested_splits
            .iter()
            .copied()
            .filter(|offset| *offset > 0 && *offset < char_len)
            .collect::<Vec<_>>();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub filename: String,
    pub document_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub chunk_number: usize,
    pub content: String,
    pub token_count: usize,
    pub topic: String,
    pub source_info: SourceInfo,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub document_name: String,
    pub total_chunks: usize,
    pub processed_date: String,
    pub chunking_method: ChunkingMethod,
    pub token_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSet {
    pub document_info: DocumentInfo,
    pub chunks: Vec<ChunkRecord>,
}

impl ChunkSet {
    pub fn document_name(&self) -> &str {
        &self.document_info.document_name
    }

    pub fn total_tokens(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.token_count).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub rank: usize,
    pub text: String,
    pub score: f32,
    pub source_filename: String,
    pub chunk_number: usize,
    pub document_name: String,
    pub chunk_id: String,
    pub topic: String,
    pub token_count: usize,
    pub created_at: String,
    pub chunking_method: ChunkingMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCitation {
    pub display: String,
    pub source_filename: String,
    pub chunk_number: usize,
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub question: String,
    pub final_answer: String,
    pub sources_used: Vec<SourceCitation>,
    pub retrieved_context: Vec<ContextEntry>,
    pub generator: String,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub run_id: String,
    pub filename: String,
    pub document_name: String,
    pub collection: String,
    pub pages: usize,
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub chunking_method: ChunkingMethod,
    pub merged_segments: usize,
    pub split_segments: usize,
    pub topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_unsorted_offsets() {
        let suggestion = BoundarySuggestion {
            suggested_splits: vec![40, 0, 12, 40, 99, 12, 7],
            topics: Vec::new(),
            reasoning: Vec::new(),
        };

        assert_eq!(suggestion.normalized_offsets(50), vec![7, 12, 40]);
    }

    #[test]
    fn chunking_method_serializes_as_tag() {
        let encoded = serde_json::to_string(&ChunkingMethod::WordWindow).unwrap();
        assert_eq!(encoded, "\"fallback_word_window\"");
        assert_eq!(
            ChunkingMethod::from_tag("agentic_llm"),
            Some(ChunkingMethod::Suggested)
        );
    }

    #[test]
    fn suggestion_tolerates_missing_fields() {
        let parsed: BoundarySuggestion =
            serde_json::from_str(r#"{"suggested_splits":[10,20]}"#).unwrap();
        assert_eq!(parsed.suggested_splits, vec![10, 20]);
        assert!(parsed.topics.is_empty());
    }
}
