use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use quire_core::{ChunkRecord, ChunkSet, ChunkingMethod, DocumentInfo, Settings, SourceInfo};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub const CHUNKS_FILE_NAME: &str = "chunks.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSetSummary {
    pub document_name: String,
    pub filename: String,
    pub total_chunks: usize,
    pub chunking_method: ChunkingMethod,
    pub processed_date: String,
}

impl From<&DocumentInfo> for ChunkSetSummary {
    fn from(info: &DocumentInfo) -> Self {
        Self {
            document_name: info.document_name.clone(),
            filename: info.filename.clone(),
            total_chunks: info.total_chunks,
            chunking_method: info.chunking_method,
            processed_date: info.processed_date.clone(),
        }
    }
}

// Saving replaces any previous set for the same document name.
pub trait ChunkSetRepository: Send + Sync {
    async fn save_chunk_set(&self, chunk_set: &ChunkSet) -> Result<()>;
    async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>>;
    async fn list_chunk_sets(&self) -> Result<Vec<ChunkSetSummary>>;
    async fn delete_chunk_set(&self, document_name: &str) -> Result<bool>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    chunk_sets: Arc<RwLock<BTreeMap<String, ChunkSet>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkSetRepository for MemoryStore {
    async fn save_chunk_set(&self, chunk_set: &ChunkSet) -> Result<()> {
        self.chunk_sets
            .write()
            .insert(chunk_set.document_name().to_string(), chunk_set.clone());
        Ok(())
    }

    async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>> {
        Ok(self.chunk_sets.read().get(document_name).cloned())
    }

    async fn list_chunk_sets(&self) -> Result<Vec<ChunkSetSummary>> {
        Ok(self
            .chunk_sets
            .read()
            .values()
            .map(|set| ChunkSetSummary::from(&set.document_info))
            .collect())
    }

    async fn delete_chunk_set(&self, document_name: &str) -> Result<bool> {
        Ok(self.chunk_sets.write().remove(document_name).is_some())
    }
}

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Document names must stay a single directory below the root.
    pub fn chunks_path(&self, document_name: &str) -> Result<PathBuf> {
        let mut components = Path::new(document_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {
                Ok(self.root.join(document_name).join(CHUNKS_FILE_NAME))
            }
            _ => Err(anyhow!("document name {document_name:?} is not a plain directory name")),
        }
    }
}

impl ChunkSetRepository for JsonDirStore {
    async fn save_chunk_set(&self, chunk_set: &ChunkSet) -> Result<()> {
        let path = self.chunks_path(chunk_set.document_name())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }

        let body = serde_json::to_string_pretty(chunk_set)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed writing {}", path.display()))?;

        debug!(path = %path.display(), chunks = chunk_set.chunks.len(), "saved chunk set");
        Ok(())
    }

    async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>> {
        let path = self.chunks_path(document_name)?;
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", path.display()))
            }
        };

        let chunk_set = serde_json::from_str(&body)
            .with_context(|| format!("malformed chunk set at {}", path.display()))?;
        Ok(Some(chunk_set))
    }

    async fn list_chunk_sets(&self) -> Result<Vec<ChunkSetSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed listing {}", self.root.display()))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().join(CHUNKS_FILE_NAME).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            if let Some(set) = self.load_chunk_set(&name).await? {
                summaries.push(ChunkSetSummary::from(&set.document_info));
            }
        }
        Ok(summaries)
    }

    async fn delete_chunk_set(&self, document_name: &str) -> Result<bool> {
        let path = self.chunks_path(document_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
        }
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_sets (
              document_name TEXT PRIMARY KEY,
              filename TEXT NOT NULL,
              total_chunks INTEGER NOT NULL,
              processed_date TEXT NOT NULL,
              chunking_method TEXT NOT NULL,
              token_range TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
              chunk_id TEXT PRIMARY KEY,
              document_name TEXT NOT NULL,
              chunk_number INTEGER NOT NULL,
              content TEXT NOT NULL,
              token_count INTEGER NOT NULL,
              topic TEXT NOT NULL,
              filename TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_method(tag: &str) -> Result<ChunkingMethod> {
    ChunkingMethod::from_tag(tag).ok_or_else(|| anyhow!("unknown chunking method `{tag}`"))
}

impl ChunkSetRepository for SqliteStore {
    async fn save_chunk_set(&self, chunk_set: &ChunkSet) -> Result<()> {
        let info = &chunk_set.document_info;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_name = ?1")
            .bind(&info.document_name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO chunk_sets (document_name, filename, total_chunks, processed_date, chunking_method, token_range)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(document_name) DO UPDATE SET
              filename=excluded.filename,
              total_chunks=excluded.total_chunks,
              processed_date=excluded.processed_date,
              chunking_method=excluded.chunking_method,
              token_range=excluded.token_range
            "#,
        )
        .bind(&info.document_name)
        .bind(&info.filename)
        .bind(info.total_chunks as i64)
        .bind(&info.processed_date)
        .bind(info.chunking_method.as_tag())
        .bind(&info.token_range)
        .execute(&mut *tx)
        .await?;

        for chunk in &chunk_set.chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (chunk_id, document_name, chunk_number, content, token_count, topic, filename, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&info.document_name)
            .bind(chunk.chunk_number as i64)
            .bind(&chunk.content)
            .bind(chunk.token_count as i64)
            .bind(&chunk.topic)
            .bind(&chunk.source_info.filename)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>> {
        let row = sqlx::query(
            r#"
            SELECT document_name, filename, total_chunks, processed_date, chunking_method, token_range
            FROM chunk_sets
            WHERE document_name = ?1
            "#,
        )
        .bind(document_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document_info = DocumentInfo {
            filename: row.get("filename"),
            document_name: row.get("document_name"),
            total_chunks: row.get::<i64, _>("total_chunks") as usize,
            processed_date: row.get("processed_date"),
            chunking_method: parse_method(&row.get::<String, _>("chunking_method"))?,
            token_range: row.get("token_range"),
        };

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, chunk_number, content, token_count, topic, filename, created_at
            FROM chunks
            WHERE document_name = ?1
            ORDER BY chunk_number
            "#,
        )
        .bind(document_name)
        .fetch_all(&self.pool)
        .await?;

        let chunks = rows
            .into_iter()
            .map(|row| ChunkRecord {
                chunk_id: row.get("chunk_id"),
                chunk_number: row.get::<i64, _>("chunk_number") as usize,
                content: row.get("content"),
                token_count: row.get::<i64, _>("token_count") as usize,
                topic: row.get("topic"),
                source_info: SourceInfo {
                    filename: row.get("filename"),
                    document_name: document_info.document_name.clone(),
                },
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(Some(ChunkSet {
            document_info,
            chunks,
        }))
    }

    async fn list_chunk_sets(&self) -> Result<Vec<ChunkSetSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT document_name, filename, total_chunks, processed_date, chunking_method
            FROM chunk_sets
            ORDER BY document_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ChunkSetSummary {
                    document_name: row.get("document_name"),
                    filename: row.get("filename"),
                    total_chunks: row.get::<i64, _>("total_chunks") as usize,
                    chunking_method: parse_method(&row.get::<String, _>("chunking_method"))?,
                    processed_date: row.get("processed_date"),
                })
            })
            .collect()
    }

    async fn delete_chunk_set(&self, document_name: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_name = ?1")
            .bind(document_name)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM chunk_sets WHERE document_name = ?1")
            .bind(document_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
    JsonDir(JsonDirStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn json_dir(root: impl Into<PathBuf>) -> Self {
        Self::JsonDir(JsonDirStore::new(root))
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        match &settings.database_url {
            Some(url) => Self::sqlite(url).await,
            None => Ok(Self::json_dir(&settings.data_dir)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
            Store::JsonDir(_) => "json-dir",
        }
    }
}

impl ChunkSetRepository for Store {
    async fn save_chunk_set(&self, chunk_set: &ChunkSet) -> Result<()> {
        match self {
            Store::Memory(store) => store.save_chunk_set(chunk_set).await,
            Store::Sqlite(store) => store.save_chunk_set(chunk_set).await,
            Store::JsonDir(store) => store.save_chunk_set(chunk_set).await,
        }
    }

    async fn load_chunk_set(&self, document_name: &str) -> Result<Option<ChunkSet>> {
        match self {
            Store::Memory(store) => store.load_chunk_set(document_name).await,
            Store::Sqlite(store) => store.load_chunk_set(document_name).await,
            Store::JsonDir(store) => store.load_chunk_set(document_name).await,
        }
    }

    async fn list_chunk_sets(&self) -> Result<Vec<ChunkSetSummary>> {
        match self {
            Store::Memory(store) => store.list_chunk_sets().await,
            Store::Sqlite(store) => store.list_chunk_sets().await,
            Store::JsonDir(store) => store.list_chunk_sets().await,
        }
    }

    async fn delete_chunk_set(&self, document_name: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.delete_chunk_set(document_name).await,
            Store::Sqlite(store) => store.delete_chunk_set(document_name).await,
            Store::JsonDir(store) => store.delete_chunk_set(document_name).await,
        }
    }
}
