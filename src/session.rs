//! Per-session query history.
//!
//! The complex retrieval strategy annotates and biases later retrievals
//! with what a session has already seen. History is the only cross-request
//! shared mutable state in the core, so it lives behind a per-session
//! lock as an append-only log — never as global state.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// One past query and the chunk ids it surfaced.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub query: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A caller-owned retrieval session.
///
/// Cheap to create; concurrent queries within one session serialize only
/// on the history append and snapshot.
#[derive(Default)]
pub struct Session {
    history: Mutex<Vec<HistoryEntry>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to the log.
    pub async fn record(&self, query: &str, chunk_ids: Vec<String>) {
        let mut history = self.history.lock().await;
        history.push(HistoryEntry {
            query: query.to_string(),
            retrieved_chunk_ids: chunk_ids,
            timestamp: Utc::now(),
        });
    }

    /// Queries issued so far, oldest first.
    pub async fn query_snapshot(&self) -> Vec<String> {
        let history = self.history.lock().await;
        history.iter().map(|e| e.query.clone()).collect()
    }

    /// How many past retrievals in this session surfaced `chunk_id`.
    pub async fn repeat_count(&self, chunk_id: &str) -> usize {
        let history = self.history.lock().await;
        history
            .iter()
            .filter(|e| e.retrieved_chunk_ids.iter().any(|id| id == chunk_id))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.history.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_only_ordering() {
        let session = Session::new();
        session.record("first", vec!["c1".into()]).await;
        session.record("second", vec!["c1".into(), "c2".into()]).await;

        let snapshot = session.query_snapshot().await;
        assert_eq!(snapshot, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(session.len().await, 2);
    }

    #[tokio::test]
    async fn test_repeat_count() {
        let session = Session::new();
        session.record("q1", vec!["c1".into()]).await;
        session.record("q2", vec!["c1".into(), "c2".into()]).await;

        assert_eq!(session.repeat_count("c1").await, 2);
        assert_eq!(session.repeat_count("c2").await, 1);
        assert_eq!(session.repeat_count("c3").await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let session = std::sync::Arc::new(Session::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let s = std::sync::Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                s.record(&format!("q{}", i), vec![]).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(session.len().await, 16);
    }
}
