//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for a batch of documents: normalize →
//! chunk → embed (batched) → one atomic upsert per document. Documents
//! run with bounded worker parallelism; chunks within a document are
//! embedded in batches but written in a single store call so no reader
//! ever sees a half-updated document.
//!
//! Embedding failures are reported per chunk, so a batch ingestion ends
//! with a partial-success report (X/N chunks indexed) instead of an
//! abort.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{embed_chunks, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::SourceType;
use crate::normalize::normalize_text;
use crate::store::{build_entries, new_document, VectorStore};

/// Outcome of ingesting one document.
#[derive(Debug)]
pub struct IngestReport {
    pub origin: String,
    pub chunks_total: usize,
    pub chunks_indexed: usize,
    /// Chunk indices whose embedding failed, with the error message.
    pub failed: Vec<(usize, String)>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ingest one document: normalize, chunk, embed, upsert atomically.
///
/// An empty document (after normalization) yields a report with zero
/// chunks; any previously indexed version of the origin is removed so
/// re-ingestion always replaces. If every chunk fails to embed the
/// prior version of the document is left untouched.
pub async fn ingest_document(
    store: &VectorStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    origin: &str,
    source_type: SourceType,
    raw_text: &str,
) -> Result<IngestReport> {
    let text = normalize_text(raw_text);

    let chunks = chunk_text(
        "pending",
        &text,
        config.chunking.chunk_size,
        config.chunking.overlap,
    )?;

    if chunks.is_empty() {
        // Replace semantics hold even when the new content is empty:
        // any prior version of this origin must stop being searchable.
        match store.delete_document(origin).await {
            Ok(()) | Err(RagError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        tracing::debug!(origin, "document empty after normalization, nothing to index");
        return Ok(IngestReport {
            origin: origin.to_string(),
            chunks_total: 0,
            chunks_indexed: 0,
            failed: Vec::new(),
        });
    }

    let doc = new_document(origin, source_type, text);
    let chunks: Vec<_> = chunks
        .into_iter()
        .map(|mut c| {
            c.document_id = doc.id.clone();
            c
        })
        .collect();

    let report = embed_chunks(provider, &chunks, config.embedding.batch_size).await;
    let entries = build_entries(&chunks, &report.vectors, provider.model_version());

    let chunks_total = chunks.len();
    let chunks_indexed = entries.len();

    if !entries.is_empty() {
        store.upsert_document(&doc, &entries).await?;
    }

    let failed: Vec<(usize, String)> = report
        .failures
        .into_iter()
        .map(|(idx, e)| (idx, e.to_string()))
        .collect();

    tracing::info!(
        origin,
        chunks_total,
        chunks_indexed,
        failed = failed.len(),
        "document ingested"
    );

    Ok(IngestReport {
        origin: origin.to_string(),
        chunks_total,
        chunks_indexed,
        failed,
    })
}

/// Ingest a batch of `(origin, source_type, raw_text)` items with
/// bounded parallelism (`ingest.workers`). Per-document failures are
/// collected, not fatal to the batch.
pub async fn ingest_batch(
    store: Arc<VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: &Config,
    items: Vec<(String, SourceType, String)>,
) -> Vec<Result<IngestReport>> {
    let semaphore = Arc::new(Semaphore::new(config.ingest.workers));
    let mut handles = Vec::with_capacity(items.len());

    for (origin, source_type, raw_text) in items {
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let config = config.clone();
        let semaphore = Arc::clone(&semaphore);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| RagError::Timeout("ingest worker pool closed".to_string()))?;
            ingest_document(
                &store,
                provider.as_ref(),
                &config,
                &origin,
                source_type,
                &raw_text,
            )
            .await
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => reports.push(result),
            Err(e) => reports.push(Err(RagError::ModelUnavailable(format!(
                "ingest task panicked: {}",
                e
            )))),
        }
    }
    reports
}

/// Plain-text file extractor for the CLI.
///
/// Source-specific extraction (PDF, CSV, web) is out of core; this walks
/// a file or directory and reads `.txt` and `.md` files as UTF-8,
/// producing the `(origin, raw_text)` pairs the pipeline consumes.
pub fn collect_text_files(path: &Path) -> Result<Vec<(String, SourceType, String)>> {
    if path.is_file() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RagError::NotFound(format!("{}: {}", path.display(), e)))?;
        return Ok(vec![(path.display().to_string(), SourceType::Text, text)]);
    }

    if !path.is_dir() {
        return Err(RagError::NotFound(path.display().to_string()));
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry =
            entry.map_err(|e| RagError::NotFound(format!("{}: {}", path.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if ext != "txt" && ext != "md" {
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(text) => items.push((entry.path().display().to_string(), SourceType::Text, text)),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable file");
            }
        }
    }

    items.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(items)
}
