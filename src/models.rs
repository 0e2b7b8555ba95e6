//! Core data models used throughout Ragline.
//!
//! These types represent the documents, chunks, index entries, and
//! retrieval results that flow through the ingestion and retrieval
//! pipeline. `Document` and `Chunk` are upstream inputs consumed once at
//! ingestion; `IndexEntry` rows are owned by the vector store;
//! `RetrievalResult` and `RetrievalContext` are ephemeral, produced per
//! query and never persisted.

use serde::Serialize;

/// Kind of source a document was extracted from.
///
/// Extraction itself is out of core — PDF parsing, CSV parsing, and web
/// scraping all hand plain text to the pipeline. `Text` covers plain
/// files ingested directly by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Csv,
    Web,
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Csv => "csv",
            SourceType::Web => "web",
            SourceType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(SourceType::Pdf),
            "csv" => Some(SourceType::Csv),
            "web" => Some(SourceType::Web),
            "text" => Some(SourceType::Text),
            _ => None,
        }
    }
}

/// A document handed to the pipeline: origin plus normalized text.
///
/// Immutable once created. Re-ingesting the same origin replaces the
/// prior version wholesale (old chunks are destroyed).
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source_type: SourceType,
    /// Path or URL the text was extracted from. Unique per collection.
    pub origin: String,
    /// Normalized text. Chunk offsets and citations refer to this string.
    pub raw_text: String,
}

/// A bounded segment of a document's normalized text.
///
/// Offsets are character offsets (not bytes) into the document text and
/// are monotonic non-decreasing across `sequence_index`. Adjacent chunks
/// overlap by the configured overlap but cover the document without gaps.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
    pub sequence_index: i64,
    /// SHA-256 of the chunk text, for staleness detection and dedup.
    pub hash: String,
}

/// Persisted unit of similarity search: a chunk plus its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub model_version: String,
}

/// Pointer back to the original source span a retrieved chunk came from.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub origin: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
}

/// A single retrieval hit: chunk text, similarity score, and provenance.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    /// Cosine similarity in [-1, 1], higher is better.
    pub score: f64,
    pub citation: Citation,
}

/// Structured output of the complex strategy, handed to the assembler.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalContext {
    pub query: String,
    pub results: Vec<RetrievalResult>,
    /// Queries previously issued in this session, oldest first.
    pub history_snapshot: Vec<String>,
}

/// One passage inside a [`GenerationRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub text: String,
    pub citation: Citation,
}

/// Formatted request handed to the external generation service.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub query: String,
    pub passages: Vec<Passage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,
}
