use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use quire_chunking::{Chunker, Cl100kTokenizer, Tokenizer, WhitespaceTokenizer};
use quire_core::{squash_whitespace, BoundarySuggestion, ChunkingMethod, Settings, TokenBudget};
use quire_ml::EmbeddingStack;
use quire_observability::PipelineMetrics;
use quire_pipeline::{extract_document, BoundarySuggester, DocumentPipeline, NO_CONTEXT_ANSWER};
use quire_retrieval::VectorIndex;
use quire_storage::{ChunkSetRepository, JsonDirStore, Store};

struct FailingSuggester;

#[async_trait]
impl BoundarySuggester for FailingSuggester {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn suggest(&self, _text: &str, _budget: TokenBudget) -> Result<BoundarySuggestion> {
        Err(anyhow!("provider unavailable"))
    }
}

struct OutOfRangeSuggester;

#[async_trait]
impl BoundarySuggester for OutOfRangeSuggester {
    fn name(&self) -> &'static str {
        "out-of-range"
    }

    async fn suggest(&self, text: &str, _budget: TokenBudget) -> Result<BoundarySuggestion> {
        Ok(BoundarySuggestion {
            suggested_splits: vec![text.chars().count() + 10],
            topics: vec!["Ignored".to_string()],
            reasoning: Vec::new(),
        })
    }
}

fn write_pages(root: &Path, document: &str, pages: &[String]) -> std::path::PathBuf {
    let pages_dir = root.join(document).join("pages");
    std::fs::create_dir_all(&pages_dir).unwrap();
    for (idx, body) in pages.iter().enumerate() {
        std::fs::write(pages_dir.join(format!("page{}.md", idx + 1)), body).unwrap();
    }
    root.join(document)
}

fn sample_pages() -> Vec<String> {
    (1..=4)
        .map(|page| {
            (1..=8)
                .map(|n| format!("Section {page}.{n} explains how harbour pilots board incoming vessels."))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn pipeline_with(
    store: Store,
    tokenizer: Arc<dyn Tokenizer>,
    budget: TokenBudget,
) -> DocumentPipeline<Store> {
    let embeddings = EmbeddingStack::load_default(&Settings {
        embed_dims: 128,
        ..Settings::default()
    });
    DocumentPipeline::new(
        Chunker::new(budget, tokenizer),
        Arc::new(store),
        VectorIndex::new(Some(embeddings.embedder)),
        PipelineMetrics::shared(),
    )
}

#[tokio::test]
async fn failing_provider_falls_back_and_persists_chunks_file() {
    let inputs = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let doc_dir = write_pages(inputs.path(), "pilot_manual", &sample_pages());

    let pipeline = pipeline_with(
        Store::json_dir(data.path()),
        Arc::new(WhitespaceTokenizer),
        TokenBudget::new(20, 60).unwrap(),
    )
    .with_suggester(Arc::new(FailingSuggester), Duration::from_secs(1));

    let report = pipeline.ingest_path(&doc_dir, None).await.unwrap();

    assert_eq!(report.chunking_method, ChunkingMethod::WordWindow);
    assert_eq!(report.document_name, "pilot_manual");
    assert_eq!(report.pages, 4);
    assert_eq!(pipeline.metrics().snapshot().fallback_total, 1);

    let chunks_file = JsonDirStore::new(data.path()).chunks_path("pilot_manual").unwrap();
    let raw = std::fs::read_to_string(chunks_file).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["document_info"]["chunking_method"], "fallback_word_window");
    assert_eq!(value["document_info"]["token_range"], "20-60");
    assert_eq!(value["document_info"]["total_chunks"], report.total_chunks);

    let stored = pipeline.load_chunk_set("pilot_manual").await.unwrap().unwrap();
    for (idx, chunk) in stored.chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_number, idx + 1);
        assert_eq!(chunk.chunk_id, format!("pilot_manual_chunk_{:03}", idx + 1));
        assert_eq!(chunk.topic, "Content section");
    }

    let document = extract_document(&doc_dir).unwrap();
    let rebuilt = stored
        .chunks
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<String>();
    assert_eq!(
        squash_whitespace(&rebuilt),
        squash_whitespace(&document.combined_text().unwrap())
    );
}

#[tokio::test]
async fn reingesting_replaces_chunk_set_with_identical_boundaries() {
    let inputs = tempfile::tempdir().unwrap();
    let doc_dir = write_pages(inputs.path(), "pilot_manual", &sample_pages());
    let pipeline = pipeline_with(
        Store::memory(),
        Arc::new(WhitespaceTokenizer),
        TokenBudget::new(15, 45).unwrap(),
    )
    .with_suggester(Arc::new(OutOfRangeSuggester), Duration::from_secs(1));

    pipeline.ingest_path(&doc_dir, None).await.unwrap();
    let first = pipeline.load_chunk_set("pilot_manual").await.unwrap().unwrap();
    pipeline.ingest_path(&doc_dir, None).await.unwrap();
    let second = pipeline.load_chunk_set("pilot_manual").await.unwrap().unwrap();

    let contents = |set: &quire_core::ChunkSet| {
        set.chunks
            .iter()
            .map(|chunk| chunk.content.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(contents(&first), contents(&second));
    assert_eq!(second.document_info.chunking_method, ChunkingMethod::WordWindow);

    assert_eq!(pipeline.store().list_chunk_sets().await.unwrap().len(), 1);
    let stats = pipeline
        .index()
        .collection_stats("pilot_manual_embeddings")
        .unwrap();
    assert_eq!(stats.total_chunks, second.chunks.len());
    assert_eq!(pipeline.metrics().snapshot().fallback_total, 2);
}

#[tokio::test]
async fn cl100k_chunks_stay_within_ceiling() {
    let long_text = (1..=120)
        .map(|n| format!("Clause {n} requires the operator to log every inspection result."))
        .collect::<Vec<_>>()
        .join(" ");
    let inputs = tempfile::tempdir().unwrap();
    let path = inputs.path().join("operations.txt");
    std::fs::write(&path, &long_text).unwrap();

    let tokenizer = Arc::new(Cl100kTokenizer::new().unwrap());
    let pipeline = pipeline_with(Store::memory(), tokenizer.clone(), TokenBudget::new(40, 120).unwrap());

    let report = pipeline.ingest_path(&path, None).await.unwrap();
    let stored = pipeline.load_chunk_set("operations").await.unwrap().unwrap();

    assert!(report.total_chunks > 1);
    for chunk in &stored.chunks {
        assert!(chunk.token_count <= 120, "chunk {} has {} tokens", chunk.chunk_id, chunk.token_count);
        assert_eq!(chunk.token_count, tokenizer.count_tokens(&chunk.content));
    }
    assert_eq!(
        squash_whitespace(&stored.chunks.iter().map(|c| c.content.as_str()).collect::<String>()),
        squash_whitespace(&long_text)
    );
}

#[tokio::test]
async fn csv_documents_are_answerable_with_citations() {
    let inputs = tempfile::tempdir().unwrap();
    let path = inputs.path().join("berths.csv");
    std::fs::write(
        &path,
        "berth,depth,notes\nNorth,12m,Tankers dock at the north berth.\nSouth,8m,Ferries use the south berth.\n",
    )
    .unwrap();

    let pipeline = pipeline_with(
        Store::memory(),
        Arc::new(WhitespaceTokenizer),
        TokenBudget::new(5, 200).unwrap(),
    );
    let report = pipeline.ingest_path(&path, Some("harbour")).await.unwrap();
    assert_eq!(report.collection, "harbour");

    let stored = pipeline.load_chunk_set("berths").await.unwrap().unwrap();
    assert!(stored.chunks[0].content.starts_with("# CSV Content: berths.csv"));

    let answer = pipeline
        .answer("Where do tankers dock?", Some("harbour"), 3)
        .await
        .unwrap();
    assert!(answer.final_answer.contains("[Source: berths.csv | chunk 1]"));
    assert_eq!(answer.sources_used[0].chunk_id, "berths_chunk_001");

    let missing = pipeline
        .answer("Where do tankers dock?", Some("no_such_collection"), 3)
        .await
        .unwrap();
    assert_eq!(missing.final_answer, NO_CONTEXT_ANSWER);
    assert!(missing.sources_used.is_empty());
}

#[tokio::test]
async fn unsupported_files_fail_without_persisting() {
    let inputs = tempfile::tempdir().unwrap();
    let path = inputs.path().join("diagram.svg");
    std::fs::write(&path, "<svg/>").unwrap();

    let pipeline = pipeline_with(
        Store::memory(),
        Arc::new(WhitespaceTokenizer),
        TokenBudget::default(),
    );

    assert!(pipeline.ingest_path(&path, None).await.is_err());
    assert!(pipeline.store().list_chunk_sets().await.unwrap().is_empty());
    assert_eq!(pipeline.metrics().snapshot().documents_failed, 1);
}

#[tokio::test]
async fn deleting_a_document_clears_its_chunks_file_and_restored_index() {
    let inputs = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let pilot = write_pages(inputs.path(), "pilot_manual", &sample_pages());
    let harbour = write_pages(inputs.path(), "harbour_rules", &sample_pages()[..1]);
    let budget = TokenBudget::new(20, 60).unwrap();

    let pipeline = pipeline_with(Store::json_dir(data.path()), Arc::new(WhitespaceTokenizer), budget);
    pipeline.ingest_path(&pilot, None).await.unwrap();
    pipeline.ingest_path(&harbour, None).await.unwrap();

    let fresh = pipeline_with(Store::json_dir(data.path()), Arc::new(WhitespaceTokenizer), budget);
    assert_eq!(fresh.restore_index().await.unwrap(), 2);
    assert!(fresh.delete_document("pilot_manual").await.unwrap());

    let chunks_file = JsonDirStore::new(data.path()).chunks_path("pilot_manual").unwrap();
    assert!(!chunks_file.exists());
    let remaining = fresh.store().list_chunk_sets().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].document_name, "harbour_rules");
    assert!(fresh
        .search(None, "harbour pilots board vessels", 50)
        .iter()
        .all(|hit| hit.document_name == "harbour_rules"));

    assert!(!fresh.delete_document("pilot_manual").await.unwrap());
    assert!(fresh.delete_document("..").await.is_err());
}
