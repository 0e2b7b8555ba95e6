//! Retrieval engine: the two strategies over the vector store.
//!
//! Both strategies run the same embed → search core (Idle → Embedding
//! Query → Searching → Done); they are implementations of one
//! [`RetrievalStrategy`] trait so future strategies can be added without
//! touching the store contract.
//!
//! - [`SimpleStrategy`]: threshold retrieval. Embed the query, search
//!   with `k` and `min_score`, return the ordered hits. No result above
//!   the threshold yields an empty set, not an error — the caller decides
//!   what "no relevant context" means.
//! - [`ComplexStrategy`]: citation-enriched retrieval. Over-fetches,
//!   deduplicates overlapping spans per document, attaches citations,
//!   appends to the session's query history, and demotes chunks the
//!   session has already seen too often.
//!
//! Each embed+search round trip is bounded by `retrieval.timeout_secs`;
//! on expiry the query fails with [`RagError::Timeout`] instead of
//! silently retrying.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{Citation, RetrievalContext, RetrievalResult};
use crate::session::Session;
use crate::store::{SearchHit, VectorStore};

/// Shared retrieval plumbing: store + embedder + knobs.
pub struct RetrievalEngine {
    store: Arc<VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed the query and search the store, both under one deadline.
    async fn embed_and_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let deadline = Duration::from_secs(self.config.timeout_secs);

        let query_vec = tokio::time::timeout(deadline, embed_query(self.provider.as_ref(), query))
            .await
            .map_err(|_| RagError::Timeout(format!("query embedding exceeded {:?}", deadline)))??;

        let hits = tokio::time::timeout(
            deadline,
            self.store.search(
                &query_vec,
                self.provider.model_version(),
                k,
                self.config.min_score,
            ),
        )
        .await
        .map_err(|_| RagError::Timeout(format!("vector search exceeded {:?}", deadline)))??;

        tracing::debug!(query, k, hits = hits.len(), "retrieval search complete");
        Ok(hits)
    }
}

/// One retrieval strategy over the shared engine.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<RetrievalContext>;
}

fn hit_to_result(hit: SearchHit) -> RetrievalResult {
    RetrievalResult {
        chunk_id: hit.chunk_id,
        document_id: hit.document_id,
        text: hit.text,
        score: hit.score,
        citation: Citation {
            origin: hit.origin,
            char_offset_start: hit.char_start,
            char_offset_end: hit.char_end,
        },
    }
}

// ============ Simple strategy ============

/// Threshold retrieval: embed, search, filter, done.
pub struct SimpleStrategy {
    engine: Arc<RetrievalEngine>,
}

impl SimpleStrategy {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RetrievalStrategy for SimpleStrategy {
    async fn retrieve(&self, query: &str) -> Result<RetrievalContext> {
        let hits = self
            .engine
            .embed_and_search(query, self.engine.config.k)
            .await?;

        Ok(RetrievalContext {
            query: query.to_string(),
            results: hits.into_iter().map(hit_to_result).collect(),
            history_snapshot: Vec::new(),
        })
    }
}

// ============ Complex strategy ============

/// Citation-enriched retrieval with per-session history bias.
pub struct ComplexStrategy {
    engine: Arc<RetrievalEngine>,
    session: Arc<Session>,
}

impl ComplexStrategy {
    pub fn new(engine: Arc<RetrievalEngine>, session: Arc<Session>) -> Self {
        Self { engine, session }
    }
}

#[async_trait]
impl RetrievalStrategy for ComplexStrategy {
    async fn retrieve(&self, query: &str) -> Result<RetrievalContext> {
        // Over-fetch so dedup and demotion still leave k candidates.
        let hits = self
            .engine
            .embed_and_search(query, self.engine.config.over_fetch_k)
            .await?;

        let deduped = dedup_overlapping(hits);

        // Policy hook: chunks the session has already surfaced at least
        // `history_repeat_threshold` times go below fresh results;
        // relative score order is preserved within each group.
        let threshold = self.engine.config.history_repeat_threshold;
        let mut keyed = Vec::with_capacity(deduped.len());
        for hit in deduped {
            let repeated = if threshold > 0 {
                self.session.repeat_count(&hit.chunk_id).await >= threshold
            } else {
                false
            };
            keyed.push((repeated, hit));
        }
        keyed.sort_by_key(|(repeated, _)| *repeated);

        let results: Vec<RetrievalResult> = keyed
            .into_iter()
            .take(self.engine.config.k)
            .map(|(_, hit)| hit_to_result(hit))
            .collect();

        let chunk_ids: Vec<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
        let history_snapshot = self.session.query_snapshot().await;
        self.session.record(query, chunk_ids).await;

        Ok(RetrievalContext {
            query: query.to_string(),
            results,
            history_snapshot,
        })
    }
}

/// Drop results whose char span overlaps an already-kept, higher-scoring
/// result from the same document. Input must be sorted by descending
/// score (the store guarantees this).
fn dedup_overlapping(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut kept: Vec<SearchHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        let overlaps = kept.iter().any(|k| {
            k.document_id == hit.document_id
                && k.char_start < hit.char_end
                && hit.char_start < k.char_end
        });
        if !overlaps {
            kept.push(hit);
        }
    }
    kept
}

// ============ Entry points ============

/// Simple threshold retrieval, the in-process API surface for callers.
pub async fn retrieve_simple(engine: Arc<RetrievalEngine>, query: &str) -> Result<RetrievalContext> {
    SimpleStrategy::new(engine).retrieve(query).await
}

/// Citation-enriched retrieval against a caller-owned session.
pub async fn retrieve_complex(
    engine: Arc<RetrievalEngine>,
    session: Arc<Session>,
    query: &str,
) -> Result<RetrievalContext> {
    ComplexStrategy::new(engine, session).retrieve(query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, chunk: &str, start: usize, end: usize, score: f64) -> SearchHit {
        SearchHit {
            chunk_id: chunk.to_string(),
            document_id: doc.to_string(),
            origin: format!("/docs/{}.txt", doc),
            text: "text".to_string(),
            char_start: start,
            char_end: end,
            sequence_index: 0,
            score,
        }
    }

    #[test]
    fn test_dedup_keeps_best_per_overlapping_span() {
        let hits = vec![
            hit("d1", "c1", 0, 300, 0.95),
            hit("d1", "c2", 250, 550, 0.90), // overlaps c1
            hit("d1", "c3", 500, 800, 0.85), // overlaps c2 but not kept c1
            hit("d2", "c4", 0, 300, 0.80),   // different document
        ];
        let kept = dedup_overlapping(hits);
        let ids: Vec<&str> = kept.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c4"]);
    }

    #[test]
    fn test_dedup_same_span_different_documents_survive() {
        // Near-duplicate content indexed under two origins: each document
        // keeps its own representative.
        let hits = vec![hit("d1", "c1", 0, 300, 0.9), hit("d2", "c2", 0, 300, 0.89)];
        let kept = dedup_overlapping(hits);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_dedup_adjacent_spans_do_not_overlap() {
        // [0,300) and [300,600) share no character.
        let hits = vec![hit("d1", "c1", 0, 300, 0.9), hit("d1", "c2", 300, 600, 0.8)];
        let kept = dedup_overlapping(hits);
        assert_eq!(kept.len(), 2);
    }
}
