mod answer;
mod extract;
mod openai;
mod suggest;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use quire_chunking::{ChunkedDocument, Chunker};
use quire_core::{
    BoundarySuggestion, ChunkSet, ChunkingMethod, Document, GroundedAnswer, IngestionReport,
    RetrievedChunk, Settings,
};
use quire_observability::PipelineMetrics;
use quire_retrieval::{collection_name_for, VectorIndex};
use quire_storage::ChunkSetRepository;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use answer::{AnswerGenerator, ExtractiveAnswerGenerator, NO_CONTEXT_ANSWER};
pub use extract::{extract_document, ExtractionError};
pub use openai::OpenAiBoundarySuggester;
pub use suggest::BoundarySuggester;

pub struct DocumentPipeline<S>
where
    S: ChunkSetRepository,
{
    chunker: Chunker,
    suggester: Option<Arc<dyn BoundarySuggester>>,
    suggest_timeout: Duration,
    answerer: Arc<dyn AnswerGenerator>,
    store: Arc<S>,
    index: VectorIndex,
    metrics: Arc<PipelineMetrics>,
}

impl<S> DocumentPipeline<S>
where
    S: ChunkSetRepository,
{
    pub fn new(chunker: Chunker, store: Arc<S>, index: VectorIndex, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            chunker,
            suggester: None,
            suggest_timeout: Settings::default().suggest_timeout,
            answerer: Arc::new(ExtractiveAnswerGenerator::default()),
            store,
            index,
            metrics,
        }
    }

    pub fn with_suggester(mut self, suggester: Arc<dyn BoundarySuggester>, timeout: Duration) -> Self {
        self.suggester = Some(suggester);
        self.suggest_timeout = timeout;
        self
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    // `None` sends the document to the word-window fallback.
    async fn suggest_boundaries(&self, filename: &str, text: &str) -> Option<BoundarySuggestion> {
        let suggester = self.suggester.as_ref()?;
        let call = suggester.suggest(text, self.chunker.budget());

        match tokio::time::timeout(self.suggest_timeout, call).await {
            Ok(Ok(suggestion)) if suggestion.suggested_splits.is_empty() => {
                warn!(filename, provider = suggester.name(), "provider returned no split offsets");
                None
            }
            Ok(Ok(suggestion)) => {
                let char_len = text.chars().count();
                if suggestion.normalized_offsets(char_len).is_empty() {
                    warn!(
                        filename,
                        provider = suggester.name(),
                        offsets = ?suggestion.suggested_splits,
                        char_len,
                        "provider offsets fall outside the document"
                    );
                    return None;
                }
                Some(suggestion)
            }
            Ok(Err(err)) => {
                warn!(filename, provider = suggester.name(), error = %err, "boundary suggestion failed");
                None
            }
            Err(_) => {
                warn!(
                    filename,
                    provider = suggester.name(),
                    timeout_secs = self.suggest_timeout.as_secs(),
                    "boundary suggestion timed out"
                );
                None
            }
        }
    }

    pub async fn chunk(&self, document: &Document) -> Result<ChunkedDocument> {
        let combined = document.combined_text()?;
        let suggestion = self.suggest_boundaries(&document.filename, &combined).await;

        let chunked = self
            .chunker
            .chunk_document(document, suggestion, Utc::now())?;
        if chunked.method == ChunkingMethod::WordWindow {
            self.metrics.inc_fallback();
        }
        Ok(chunked)
    }

    pub async fn ingest_path(&self, path: &Path, collection: Option<&str>) -> Result<IngestionReport> {
        let owned = path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_document(&owned))
            .await
            .context("extraction task panicked")?;

        match extracted {
            Ok(document) => self.ingest_document(&document, collection).await,
            Err(err) => {
                self.metrics.inc_failed();
                Err(err).with_context(|| format!("failed extracting {}", path.display()))
            }
        }
    }

    #[instrument(skip(self, document), fields(filename = %document.filename))]
    pub async fn ingest_document(
        &self,
        document: &Document,
        collection: Option<&str>,
    ) -> Result<IngestionReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let result = self.ingest_inner(document, collection, &run_id).await;
        match &result {
            Ok(report) => {
                self.metrics.record_ingest(
                    report.total_chunks,
                    report.merged_segments,
                    report.split_segments,
                    started.elapsed(),
                );
                info!(
                    run_id = %run_id,
                    document = %report.document_name,
                    collection = %report.collection,
                    chunks = report.total_chunks,
                    tokens = report.total_tokens,
                    method = report.chunking_method.as_tag(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "document ingested"
                );
            }
            Err(err) => {
                self.metrics.inc_failed();
                warn!(run_id = %run_id, error = %err, "document ingestion failed");
            }
        }
        result
    }

    async fn ingest_inner(
        &self,
        document: &Document,
        collection: Option<&str>,
        run_id: &str,
    ) -> Result<IngestionReport> {
        let chunked = self.chunk(document).await?;
        let chunk_set = &chunked.chunk_set;

        self.store
            .save_chunk_set(chunk_set)
            .await
            .with_context(|| format!("failed persisting chunks for {}", document.filename))?;

        let collection = collection
            .map(str::to_string)
            .unwrap_or_else(|| collection_name_for(chunk_set.document_name()));
        self.index.index_chunk_set(&collection, chunk_set);

        let mut topics = chunk_set
            .chunks
            .iter()
            .map(|chunk| chunk.topic.clone())
            .collect::<Vec<_>>();
        topics.dedup();

        Ok(IngestionReport {
            run_id: run_id.to_string(),
            filename: document.filename.clone(),
            document_name: chunk_set.document_name().to_string(),
            collection,
            pages: document.pages.len(),
            total_chunks: chunk_set.chunks.len(),
            total_tokens: chunk_set.total_tokens(),
            chunking_method: chunked.method,
            merged_segments: chunked.stats.merged,
            split_segments: chunked.stats.split,
            topics,
        })
    }

    pub async fn restore_index(&self) -> Result<usize> {
        let summaries = self.store.list_chunk_sets().await?;
        let mut restored = 0;

        for summary in summaries {
            let Some(chunk_set) = self.store.load_chunk_set(&summary.document_name).await? else {
                continue;
            };
            self.index
                .index_chunk_set(&collection_name_for(chunk_set.document_name()), &chunk_set);
            restored += 1;
        }

        info!(restored, "restored index from store");
        Ok(restored)
    }

    pub async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>> {
        self.store.load_chunk_set(document_name).await
    }

    #[instrument(skip(self))]
    pub async fn delete_document(&self, document_name: &str) -> Result<bool> {
        let deleted = self
            .store
            .delete_chunk_set(document_name)
            .await
            .with_context(|| format!("failed deleting chunks for {document_name}"))?;
        let unindexed = self.index.remove_document(document_name);

        if deleted || unindexed > 0 {
            info!(deleted, unindexed, "document deleted");
        } else {
            warn!("no stored chunks for document");
        }
        Ok(deleted || unindexed > 0)
    }

    pub fn search(&self, collection: Option<&str>, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        let started = Instant::now();
        let hits = self.index.search(collection, query, top_k);
        self.metrics.record_query(hits.len(), started.elapsed());
        hits
    }

    #[instrument(skip(self))]
    pub async fn answer(
        &self,
        question: &str,
        collection: Option<&str>,
        top_k: usize,
    ) -> Result<GroundedAnswer> {
        let hits = self.search(collection, question, top_k);
        let answer = self.answerer.generate(question, &hits).await?;

        info!(
            hits = hits.len(),
            generator = self.answerer.name(),
            "answered question"
        );
        Ok(answer)
    }
}
