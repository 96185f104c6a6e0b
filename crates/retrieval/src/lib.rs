mod tokenize;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use quire_core::{normalize_text, ChunkSet, ChunkingMethod, RetrievedChunk};
use serde::Serialize;
use tracing::debug;

pub use tokenize::tokenize;

pub const KEYWORD_WEIGHT: f32 = 0.65;
pub const VECTOR_WEIGHT: f32 = 0.35;

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub chunk_number: usize,
    pub document_name: String,
    pub source_filename: String,
    pub topic: String,
    pub token_count: usize,
    pub created_at: String,
    pub chunking_method: ChunkingMethod,
    pub text: String,
    pub keywords: HashSet<String>,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalStats {
    pub collections: usize,
    pub chunks_loaded: usize,
    pub vector_enabled: bool,
    pub embedding_model: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub total_chunks: usize,
    pub documents: Vec<String>,
}

pub fn collection_name_for(document_name: &str) -> String {
    format!("{document_name}_embeddings")
        .replace(' ', "_")
        .to_lowercase()
}

#[derive(Clone, Default)]
pub struct VectorIndex {
    collections: Arc<RwLock<BTreeMap<String, Vec<IndexedChunk>>>>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl VectorIndex {
    pub fn new(embedder: Option<Arc<dyn EmbeddingModel>>) -> Self {
        Self {
            collections: Arc::default(),
            embedder,
        }
    }

    pub fn index_chunk_set(&self, collection: &str, chunk_set: &ChunkSet) -> usize {
        let info = &chunk_set.document_info;
        let indexed = chunk_set
            .chunks
            .iter()
            .map(|chunk| IndexedChunk {
                chunk_id: chunk.chunk_id.clone(),
                chunk_number: chunk.chunk_number,
                document_name: info.document_name.clone(),
                source_filename: info.filename.clone(),
                topic: chunk.topic.clone(),
                token_count: chunk.token_count,
                created_at: chunk.created_at.clone(),
                chunking_method: info.chunking_method,
                keywords: tokenize(&chunk.content).into_iter().collect(),
                embedding: self.embedder.as_ref().map(|model| model.embed(&chunk.content)),
                text: chunk.content.clone(),
            })
            .collect::<Vec<_>>();
        let count = indexed.len();

        let mut collections = self.collections.write();
        let entries = collections.entry(collection.to_string()).or_default();
        let before = entries.len();
        entries.retain(|entry| entry.document_name != info.document_name);
        let replaced = before - entries.len();
        entries.extend(indexed);

        debug!(
            collection,
            document = %info.document_name,
            indexed = count,
            replaced,
            "indexed chunk set"
        );
        count
    }

    pub fn remove_document(&self, document_name: &str) -> usize {
        let mut collections = self.collections.write();
        let mut removed = 0;
        for entries in collections.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.document_name != document_name);
            removed += before - entries.len();
        }
        collections.retain(|_, entries| !entries.is_empty());
        debug!(document = document_name, removed, "removed document from index");
        removed
    }

    pub fn stats(&self) -> RetrievalStats {
        let collections = self.collections.read();
        RetrievalStats {
            collections: collections.len(),
            chunks_loaded: collections.values().map(Vec::len).sum(),
            vector_enabled: self.embedder.is_some(),
            embedding_model: self.embedder.as_ref().map(|model| model.model_name()),
        }
    }

    pub fn list_collections(&self) -> Vec<CollectionStats> {
        self.collections
            .read()
            .iter()
            .map(|(name, entries)| collection_stats(name, entries))
            .collect()
    }

    pub fn collection_stats(&self, name: &str) -> Option<CollectionStats> {
        self.collections
            .read()
            .get(name)
            .map(|entries| collection_stats(name, entries))
    }

    pub fn search(&self, collection: Option<&str>, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        let normalized = normalize_text(query);
        let query_tokens = tokenize(&normalized).into_iter().collect::<HashSet<_>>();
        let query_embedding = self.embedder.as_ref().map(|model| model.embed(&normalized));

        let collections = self.collections.read();
        let candidates = collections
            .iter()
            .filter(|(name, _)| collection.map_or(true, |wanted| wanted == name.as_str()))
            .flat_map(|(_, entries)| entries.iter());

        let mut scored = candidates
            .map(|chunk| {
                let keyword_score = keyword_score(&query_tokens, &chunk.keywords);
                let vector_score = match (&query_embedding, &chunk.embedding) {
                    (Some(q), Some(c)) => cosine_similarity(q, c).max(0.0),
                    _ => 0.0,
                };

                let score = if query_embedding.is_some() {
                    (KEYWORD_WEIGHT * keyword_score) + (VECTOR_WEIGHT * vector_score)
                } else {
                    keyword_score
                };

                (score, chunk)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, left), (b, right)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.chunk_id.cmp(&right.chunk_id))
        });

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(idx, (score, chunk))| RetrievedChunk {
                rank: idx + 1,
                text: chunk.text.clone(),
                score,
                source_filename: chunk.source_filename.clone(),
                chunk_number: chunk.chunk_number,
                document_name: chunk.document_name.clone(),
                chunk_id: chunk.chunk_id.clone(),
                topic: chunk.topic.clone(),
                token_count: chunk.token_count,
                created_at: chunk.created_at.clone(),
                chunking_method: chunk.chunking_method,
            })
            .collect()
    }
}

fn collection_stats(name: &str, entries: &[IndexedChunk]) -> CollectionStats {
    let mut documents = entries
        .iter()
        .map(|entry| entry.document_name.clone())
        .collect::<Vec<_>>();
    documents.sort();
    documents.dedup();

    CollectionStats {
        name: name.to_string(),
        total_chunks: entries.len(),
        documents,
    }
}

fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;

    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{ChunkRecord, DocumentInfo, SourceInfo};

    fn chunk_set(document_name: &str, contents: &[&str]) -> ChunkSet {
        let filename = format!("{document_name}.pdf");
        ChunkSet {
            document_info: DocumentInfo {
                filename: filename.clone(),
                document_name: document_name.to_string(),
                total_chunks: contents.len(),
                processed_date: "2026-01-01T00:00:00+00:00".to_string(),
                chunking_method: ChunkingMethod::Suggested,
                token_range: "1-50".to_string(),
            },
            chunks: contents
                .iter()
                .enumerate()
                .map(|(idx, content)| ChunkRecord {
                    chunk_id: format!("{document_name}_chunk_{:03}", idx + 1),
                    chunk_number: idx + 1,
                    content: content.to_string(),
                    token_count: content.split_whitespace().count(),
                    topic: "Topic".to_string(),
                    source_info: SourceInfo {
                        filename: filename.clone(),
                        document_name: document_name.to_string(),
                    },
                    created_at: "2026-01-01T00:00:00+00:00".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn cosine_sanity() {
        let a = [1.0, 0.0, 1.0];
        let b = [1.0, 0.0, 1.0];
        assert!(cosine_similarity(&a, &b) > 0.99);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn collection_names_are_normalized() {
        assert_eq!(collection_name_for("Annual Report"), "annual_report_embeddings");
    }

    #[test]
    fn keyword_search_ranks_overlap() {
        let index = VectorIndex::new(None);
        index.index_chunk_set(
            "handbook_embeddings",
            &chunk_set(
                "handbook",
                &[
                    "Refunds are issued within fourteen days of the request.",
                    "Late fees accrue daily after the due date.",
                ],
            ),
        );

        let hits = index.search(Some("handbook_embeddings"), "When are refunds issued?", 5);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].chunk_id, "handbook_chunk_001");
        assert_eq!(hits[0].source_filename, "handbook.pdf");
    }

    #[test]
    fn reindexing_replaces_previous_set() {
        let index = VectorIndex::new(None);
        index.index_chunk_set("docs", &chunk_set("guide", &["old text one", "old text two"]));
        index.index_chunk_set("docs", &chunk_set("guide", &["new text"]));
        index.index_chunk_set("docs", &chunk_set("other", &["unrelated text"]));

        let stats = index.collection_stats("docs").unwrap();
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.documents, vec!["guide", "other"]);
        assert!(index.search(Some("docs"), "old", 5).is_empty());
    }

    #[test]
    fn search_can_span_collections() {
        let index = VectorIndex::new(None);
        index.index_chunk_set("a", &chunk_set("alpha", &["shared keyword alpha"]));
        index.index_chunk_set("b", &chunk_set("beta", &["shared keyword beta"]));

        assert_eq!(index.search(None, "shared keyword", 10).len(), 2);
        assert_eq!(index.search(Some("b"), "shared keyword", 10).len(), 1);
        assert_eq!(index.list_collections().len(), 2);
    }

    #[test]
    fn removing_a_document_drops_it_from_every_collection() {
        let index = VectorIndex::new(None);
        index.index_chunk_set("a", &chunk_set("alpha", &["shared keyword alpha"]));
        index.index_chunk_set("b", &chunk_set("alpha", &["shared keyword again", "more"]));
        index.index_chunk_set("b", &chunk_set("beta", &["shared keyword beta"]));

        assert_eq!(index.remove_document("alpha"), 3);
        assert_eq!(index.remove_document("alpha"), 0);

        let remaining = index.list_collections();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "b");
        assert_eq!(remaining[0].documents, vec!["beta"]);
    }
}
