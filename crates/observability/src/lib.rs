use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    documents_failed: AtomicU64,
    chunks_emitted: AtomicU64,
    fallback_total: AtomicU64,
    merged_segments: AtomicU64,
    split_segments: AtomicU64,
    queries_total: AtomicU64,
    retrieval_hits_total: AtomicU64,
    total_ingest_millis: AtomicU64,
    total_query_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub documents_ingested: u64,
    pub documents_failed: u64,
    pub chunks_emitted: u64,
    pub fallback_total: u64,
    pub merged_segments: u64,
    pub split_segments: u64,
    pub queries_total: u64,
    pub retrieval_hits_total: u64,
    pub avg_ingest_millis: f64,
    pub avg_query_millis: f64,
}

impl PipelineMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_ingest(&self, chunks: usize, merged: usize, split: usize, duration: Duration) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_emitted.fetch_add(chunks as u64, Ordering::Relaxed);
        self.merged_segments.fetch_add(merged as u64, Ordering::Relaxed);
        self.split_segments.fetch_add(split as u64, Ordering::Relaxed);
        self.total_ingest_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallback(&self) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, hits: usize, duration: Duration) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.retrieval_hits_total
            .fetch_add(hits as u64, Ordering::Relaxed);
        self.total_query_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ingested = self.documents_ingested.load(Ordering::Relaxed);
        let queries = self.queries_total.load(Ordering::Relaxed);

        MetricsSnapshot {
            documents_ingested: ingested,
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_emitted: self.chunks_emitted.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            merged_segments: self.merged_segments.load(Ordering::Relaxed),
            split_segments: self.split_segments.load(Ordering::Relaxed),
            queries_total: queries,
            retrieval_hits_total: self.retrieval_hits_total.load(Ordering::Relaxed),
            avg_ingest_millis: average(self.total_ingest_millis.load(Ordering::Relaxed), ingested),
            avg_query_millis: average(self.total_query_millis.load(Ordering::Relaxed), queries),
        }
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,quire_pipeline=info,quire_storage=info,quire_chunking=warn",
                service_name.replace('-', "_")
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
