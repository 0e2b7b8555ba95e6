//! SQLite-backed vector store.
//!
//! Owns all persisted [`IndexEntry`] rows. Writes to one document happen
//! inside a single transaction behind a per-document lock, so a racing
//! search observes either the old or the new version of that document,
//! never a mix. Reads and writes to other documents are never blocked.
//!
//! The store pins one embedding model version per collection: the first
//! upsert records it, and later upserts or searches with a different
//! version fail with [`RagError::VersionMismatch`] rather than silently
//! comparing vectors from different models.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{Chunk, Document, IndexEntry, SourceType};

/// A scored hit from [`VectorStore::search`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub origin: String,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub sequence_index: i64,
    /// Cosine similarity in [-1, 1].
    pub score: f64,
}

pub struct VectorStore {
    pool: SqlitePool,
    collection: String,
    /// Serializes writers per document origin. Readers never take these.
    document_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorStore {
    pub fn new(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
            document_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn lock_for(&self, origin: &str) -> Arc<Mutex<()>> {
        let mut locks = self.document_locks.lock().await;
        locks
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The model version pinned to this collection, if any entries exist.
    pub async fn model_version(&self) -> Result<Option<String>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT model_version FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Record the collection's model version on first write; reject a
    /// different version afterwards.
    ///
    /// Insert-then-read rather than check-then-insert: two racing first
    /// writers both attempt the insert, the conflict clause keeps one
    /// row, and the loser sees the winner's version on the read-back.
    async fn pin_model_version(&self, model_version: &str, dims: usize) -> Result<()> {
        sqlx::query(
            "INSERT INTO collections (name, model_version, dims, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&self.collection)
        .bind(model_version)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        match self.model_version().await? {
            Some(pinned) if pinned == model_version => Ok(()),
            Some(pinned) => Err(RagError::VersionMismatch {
                index: pinned,
                query: model_version.to_string(),
            }),
            None => Err(RagError::Storage(sqlx::Error::RowNotFound)),
        }
    }

    /// Insert or replace a document and its index entries atomically.
    ///
    /// Idempotent by origin: re-ingesting the same origin deletes the
    /// prior chunk set inside the same transaction, so exactly the latest
    /// version is ever searchable. All entries must share one model
    /// version, which must match the collection's.
    pub async fn upsert_document(&self, doc: &Document, entries: &[IndexEntry]) -> Result<String> {
        let model_version = match entries.first() {
            Some(first) => first.model_version.clone(),
            None => {
                return Err(RagError::InvalidConfig(
                    "cannot upsert a document with no index entries".to_string(),
                ))
            }
        };
        if let Some(odd) = entries.iter().find(|e| e.model_version != model_version) {
            return Err(RagError::VersionMismatch {
                index: model_version,
                query: odd.model_version.clone(),
            });
        }
        let dims = entries[0].vector.len();
        self.pin_model_version(&model_version, dims).await?;

        let lock = self.lock_for(&doc.origin).await;
        let _guard = lock.lock().await;

        let existing_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE collection = ? AND origin = ?",
        )
        .bind(&self.collection)
        .bind(&doc.origin)
        .fetch_optional(&self.pool)
        .await?;

        let doc_id = existing_id.unwrap_or_else(|| doc.id.clone());

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(&doc_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, origin, source_type, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, origin) DO UPDATE SET
                source_type = excluded.source_type,
                created_at = excluded.created_at
            "#,
        )
        .bind(&doc_id)
        .bind(&self.collection)
        .bind(&doc.origin)
        .bind(doc.source_type.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            let blob = vec_to_blob(&entry.vector);
            sqlx::query(
                r#"
                INSERT INTO index_entries
                    (chunk_id, collection, document_id, sequence_index, char_start, char_end, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    sequence_index = excluded.sequence_index,
                    char_start = excluded.char_start,
                    char_end = excluded.char_end,
                    text = excluded.text,
                    hash = excluded.hash,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&entry.chunk.id)
            .bind(&self.collection)
            .bind(&doc_id)
            .bind(entry.chunk.sequence_index)
            .bind(entry.chunk.char_offset_start as i64)
            .bind(entry.chunk.char_offset_end as i64)
            .bind(&entry.chunk.text)
            .bind(&entry.chunk.hash)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            origin = %doc.origin,
            entries = entries.len(),
            "document upserted"
        );

        Ok(doc_id)
    }

    /// Nearest-neighbor search by cosine similarity.
    ///
    /// Returns at most `k` hits ordered by descending score; hits below
    /// `min_score` are excluded even if fewer than `k` remain. Searching
    /// an empty or missing collection returns an empty vec, not an error.
    pub async fn search(
        &self,
        query_vec: &[f32],
        model_version: &str,
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(RagError::InvalidConfig("search k must be > 0".to_string()));
        }

        match self.model_version().await? {
            None => return Ok(Vec::new()),
            Some(pinned) if pinned != model_version => {
                return Err(RagError::VersionMismatch {
                    index: pinned,
                    query: model_version.to_string(),
                });
            }
            Some(_) => {}
        }

        let rows = sqlx::query(
            r#"
            SELECT e.chunk_id, e.document_id, e.sequence_index, e.char_start, e.char_end,
                   e.text, e.embedding, d.origin
            FROM index_entries e
            JOIN documents d ON d.id = e.document_id
            WHERE e.collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &vec) as f64;
                let char_start: i64 = row.get("char_start");
                let char_end: i64 = row.get("char_end");
                SearchHit {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    origin: row.get("origin"),
                    text: row.get("text"),
                    char_start: char_start as usize,
                    char_end: char_end as usize,
                    sequence_index: row.get("sequence_index"),
                    score,
                }
            })
            .collect();

        if let Some(threshold) = min_score {
            hits.retain(|h| h.score >= threshold);
        }

        // Sort: score desc, then document/sequence for determinism.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.document_id.cmp(&b.document_id))
                .then(a.sequence_index.cmp(&b.sequence_index))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Remove a document and all its chunks, by origin.
    ///
    /// Used for re-ingestion replace semantics and explicit deletion.
    pub async fn delete_document(&self, origin: &str) -> Result<()> {
        let lock = self.lock_for(origin).await;
        let _guard = lock.lock().await;

        let doc_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE collection = ? AND origin = ?",
        )
        .bind(&self.collection)
        .bind(origin)
        .fetch_optional(&self.pool)
        .await?;

        let doc_id = doc_id.ok_or_else(|| RagError::NotFound(origin.to_string()))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(&doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(&doc_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(origin, "document deleted");
        Ok(())
    }

    /// Count of index entries for one document origin (0 if absent).
    pub async fn entry_count(&self, origin: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM index_entries e
            JOIN documents d ON d.id = e.document_id
            WHERE d.collection = ? AND d.origin = ?
            "#,
        )
        .bind(&self.collection)
        .bind(origin)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Build a [`Document`] for ingestion with a fresh id.
pub fn new_document(origin: &str, source_type: SourceType, raw_text: String) -> Document {
    Document {
        id: Uuid::new_v4().to_string(),
        source_type,
        origin: origin.to_string(),
        raw_text,
    }
}

/// Pair chunks with their vectors into index entries, skipping chunks
/// whose embedding failed.
pub fn build_entries(
    chunks: &[Chunk],
    vectors: &[Option<Vec<f32>>],
    model_version: &str,
) -> Vec<IndexEntry> {
    chunks
        .iter()
        .zip(vectors.iter())
        .filter_map(|(chunk, vec)| {
            vec.as_ref().map(|v| IndexEntry {
                chunk: chunk.clone(),
                vector: v.clone(),
                model_version: model_version.to_string(),
            })
        })
        .collect()
}
