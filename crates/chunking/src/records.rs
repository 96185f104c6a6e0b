use chrono::{DateTime, Utc};
use quire_core::{
    document_name, ChunkRecord, ChunkSet, ChunkingMethod, DocumentInfo, SourceInfo, TokenBudget,
    UNKNOWN_TOPIC,
};

use crate::tokenizer::Tokenizer;

pub fn chunk_id(document_name: &str, ordinal: usize) -> String {
    format!("{document_name}_chunk_{ordinal:03}")
}

pub fn topic_for(topics: &[String], ordinal: usize) -> String {
    if topics.is_empty() {
        return UNKNOWN_TOPIC.to_string();
    }
    let index = ordinal.saturating_sub(1).min(topics.len() - 1);
    topics[index].clone()
}

pub fn build_chunk_records(
    filename: &str,
    chunks: &[String],
    topics: &[String],
    tokenizer: &dyn Tokenizer,
    created_at: DateTime<Utc>,
) -> Vec<ChunkRecord> {
    let document_name = document_name(filename);
    let created_at = created_at.to_rfc3339();

    chunks
        .iter()
        .enumerate()
        .map(|(idx, content)| {
            let ordinal = idx + 1;
            ChunkRecord {
                chunk_id: chunk_id(&document_name, ordinal),
                chunk_number: ordinal,
                content: content.clone(),
                token_count: tokenizer.count_tokens(content),
                topic: topic_for(topics, ordinal),
                source_info: SourceInfo {
                    filename: filename.to_string(),
                    document_name: document_name.clone(),
                },
                created_at: created_at.clone(),
            }
        })
        .collect()
}

pub struct ChunkSetInput<'a> {
    pub filename: &'a str,
    pub chunks: &'a [String],
    pub topics: &'a [String],
    pub method: ChunkingMethod,
    pub budget: TokenBudget,
    pub processed_at: DateTime<Utc>,
}

pub fn build_chunk_set(input: ChunkSetInput<'_>, tokenizer: &dyn Tokenizer) -> ChunkSet {
    let chunks = build_chunk_records(
        input.filename,
        input.chunks,
        input.topics,
        tokenizer,
        input.processed_at,
    );

    ChunkSet {
        document_info: DocumentInfo {
            filename: input.filename.to_string(),
            document_name: document_name(input.filename),
            total_chunks: chunks.len(),
            processed_date: input.processed_at.to_rfc3339(),
            chunking_method: input.method,
            token_range: input.budget.range_label(),
        },
        chunks,
    }
}
