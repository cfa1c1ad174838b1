//! Vector store adapter over SQLite.
//!
//! One `chunks` table holds text, metadata, and the embedding vector for
//! every stored chunk. The core never reaches past this interface: the
//! synchronizer sees `exists` / `list_indexed_docs` / `delete_by_doc_id` /
//! `add_chunks`, the retrieval engine sees `query`.
//!
//! The database file lives inside the index directory; its presence is
//! the "index exists" signal. Creation is lazy: the first insert creates
//! the file and schema.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, relevance_score, vec_to_blob, Embedder};
use crate::error::{Error, RemovedCount, Result};

const DB_FILE: &str = "docdex.sqlite";

/// A chunk ready for insertion. Embeddings are attached inside
/// [`VectorStore::add_chunks`]; rows are immutable once written.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub doc_id: String,
    pub file_name: String,
    pub content_hash: String,
    /// 1-based page number for paginated formats.
    pub page: Option<u32>,
    /// Position of the chunk within its document.
    pub ordinal: i64,
    pub text: String,
}

/// Metadata reconstructed from stored chunks, one entry per document.
#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub file_name: String,
    pub content_hash: String,
}

/// A ranked candidate returned from [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub file_name: String,
    pub page: Option<u32>,
    /// Relevance in [0, 1], 1 = most relevant.
    pub score: f32,
    /// The stored vector, needed by diversity selection.
    pub embedding: Vec<f32>,
}

pub struct VectorStore {
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(index_dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index_dir: index_dir.into(),
            embedder,
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    fn db_path(&self) -> PathBuf {
        self.index_dir.join(DB_FILE)
    }

    /// True iff a persisted collection is present.
    pub fn exists(&self) -> bool {
        self.db_path().exists()
    }

    async fn open(&self, create: bool) -> Result<SqlitePool> {
        if create {
            std::fs::create_dir_all(&self.index_dir)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", self.db_path().display()))?
            .create_if_missing(create)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(pool)
    }

    async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                page INTEGER,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Total stored chunk count: 0 when no collection exists, -1 when the
    /// count could not be read.
    pub async fn count(&self) -> i64 {
        if !self.exists() {
            return 0;
        }

        let pool = match self.open(false).await {
            Ok(pool) => pool,
            Err(_) => return -1,
        };

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks")
            .fetch_one(&pool)
            .await
            .unwrap_or(-1);

        pool.close().await;
        count
    }

    /// Reconstruct the indexed-document map with a single full metadata
    /// scan, keeping the first occurrence per `doc_id` (all chunks of a
    /// document share the same hash, so any occurrence suffices).
    pub async fn list_indexed_docs(&self) -> Result<HashMap<String, IndexedDoc>> {
        if !self.exists() {
            return Ok(HashMap::new());
        }

        let pool = self.open(false).await?;
        let rows = sqlx::query("SELECT doc_id, file_name, content_hash FROM chunks ORDER BY rowid")
            .fetch_all(&pool)
            .await?;
        pool.close().await;

        let mut out: HashMap<String, IndexedDoc> = HashMap::new();
        for row in &rows {
            let doc_id: String = row.get("doc_id");
            out.entry(doc_id).or_insert_with(|| IndexedDoc {
                file_name: row.get("file_name"),
                content_hash: row.get("content_hash"),
            });
        }

        Ok(out)
    }

    /// Delete all chunks belonging to a document.
    ///
    /// The delete itself is atomic. The returned count downgrades to
    /// [`RemovedCount::Unknown`] when the post-delete verification cannot
    /// confirm the exact number, so callers never mistake an uncertain
    /// result for "nothing removed".
    pub async fn delete_by_doc_id(&self, doc_id: &str) -> Result<RemovedCount> {
        if !self.exists() {
            return Ok(RemovedCount::Exact(0));
        }

        let pool = self.open(false).await?;

        let result = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&pool)
            .await;

        let removed = match result {
            Ok(res) => res.rows_affected(),
            Err(e) => {
                pool.close().await;
                return Err(e.into());
            }
        };

        let verification = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .fetch_one(&pool)
            .await;
        pool.close().await;

        match verification {
            Ok(0) => Ok(RemovedCount::Exact(removed)),
            _ => Ok(RemovedCount::Unknown),
        }
    }

    /// Embed and persist a set of chunks in one transaction.
    ///
    /// Creates the collection on first use.
    pub async fn add_chunks(&self, chunks: &[ChunkRecord]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_texts(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::BackendUnavailable(format!(
                "embedding count mismatch: {} texts, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        let pool = self.open(true).await?;
        Self::ensure_schema(&pool).await?;

        let mut tx = pool.begin().await?;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, doc_id, file_name, content_hash, page, ordinal, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.doc_id)
            .bind(&chunk.file_name)
            .bind(&chunk.content_hash)
            .bind(chunk.page.map(|p| p as i64))
            .bind(chunk.ordinal)
            .bind(&chunk.text)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        pool.close().await;
        Ok(())
    }

    /// Embed the query and rank every stored chunk by cosine similarity,
    /// returning the top `pool_size` candidates. Ties keep insertion
    /// order (the sort is stable and compares scores only).
    pub async fn query(&self, query_text: &str, pool_size: usize) -> Result<Vec<Candidate>> {
        if !self.exists() || pool_size == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query_text).await?;

        let pool = self.open(false).await?;
        let rows = sqlx::query("SELECT text, file_name, page, embedding FROM chunks ORDER BY rowid")
            .fetch_all(&pool)
            .await?;
        pool.close().await;

        let mut candidates: Vec<Candidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                let score = relevance_score(cosine_similarity(&query_vec, &embedding));
                Candidate {
                    text: row.get("text"),
                    file_name: row.get("file_name"),
                    page: row.get::<Option<i64>, _>("page").map(|p| p as u32),
                    score,
                    embedding,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(pool_size);

        Ok(candidates)
    }
}
