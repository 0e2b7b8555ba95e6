//! Answer assembly and the generation service interface.
//!
//! [`assemble`] is pure formatting: it turns a [`RetrievalContext`] into
//! the [`GenerationRequest`] handed to the external generation service.
//! No retrieval logic lives here.
//!
//! The generation service itself is out of core and consumed through the
//! [`GenerationService`] trait; [`HttpGenerationService`] talks to any
//! OpenAI-compatible chat-completions endpoint. The core never retries a
//! failed generation — that is the caller's call — but it does surface
//! [`RagError::GenerationUnavailable`], distinct from retrieval errors.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::models::{Citation, GenerationRequest, Passage, RetrievalContext};

/// Format a retrieval context into a generation request. Pure function.
pub fn assemble(context: &RetrievalContext) -> GenerationRequest {
    GenerationRequest {
        query: context.query.clone(),
        passages: context
            .results
            .iter()
            .map(|r| Passage {
                text: r.text.clone(),
                citation: r.citation.clone(),
            })
            .collect(),
        history: if context.history_snapshot.is_empty() {
            None
        } else {
            Some(context.history_snapshot.clone())
        },
    }
}

/// A summarized answer plus the citations it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// External generation service, consumed as a single summarize call.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn summarize(&self, request: &GenerationRequest) -> Result<String>;
}

/// Assemble the context, call the service, and return its response
/// unmodified plus the citations for display.
///
/// An empty result set is passed through explicitly — the core never
/// fabricates a "no relevant info" answer on the service's behalf.
pub async fn answer(
    service: &dyn GenerationService,
    context: &RetrievalContext,
) -> Result<Answer> {
    let request = assemble(context);
    let citations = request.passages.iter().map(|p| p.citation.clone()).collect();
    let text = service.summarize(&request).await?;
    Ok(Answer { text, citations })
}

/// OpenAI-compatible chat-completions client.
///
/// Works against any endpoint speaking the `/v1/chat/completions` shape
/// (OpenAI, Groq, Ollama's compatibility layer, vLLM). The `API_KEY`
/// environment variable, when set, is sent as a bearer token.
pub struct HttpGenerationService {
    url: String,
    model: String,
    timeout: Duration,
}

impl HttpGenerationService {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let url = config.url.clone().ok_or_else(|| {
            RagError::InvalidConfig("generation.url required for the generation service".into())
        })?;
        let model = config.model.clone().ok_or_else(|| {
            RagError::InvalidConfig("generation.model required for the generation service".into())
        })?;
        Ok(Self {
            url,
            model,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn build_prompt(request: &GenerationRequest) -> String {
        let mut prompt = String::from("Use the following context to answer the question concisely.\n\nContext:\n");
        for (i, passage) in request.passages.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] ({}, chars {}-{})\n{}\n\n",
                i + 1,
                passage.citation.origin,
                passage.citation.char_offset_start,
                passage.citation.char_offset_end,
                passage.text
            ));
        }
        prompt.push_str(&format!("Question: {}\n\nAnswer:", request.query));
        prompt
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn summarize(&self, request: &GenerationRequest) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RagError::GenerationUnavailable(format!("http client: {}", e)))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant. Answer ONLY using the provided context."
                },
                {
                    "role": "user",
                    "content": Self::build_prompt(request)
                }
            ],
        });

        let mut req = client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Ok(key) = std::env::var("API_KEY") {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                RagError::Timeout(format!("generation request: {}", e))
            } else {
                RagError::GenerationUnavailable(format!("generation request: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::GenerationUnavailable(format!(
                "generation service error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("generation response: {}", e)))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                RagError::GenerationUnavailable(
                    "invalid generation response: missing choices[0].message.content".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievalResult;

    fn context_with(results: Vec<RetrievalResult>, history: Vec<String>) -> RetrievalContext {
        RetrievalContext {
            query: "what is chunking?".to_string(),
            results,
            history_snapshot: history,
        }
    }

    fn result(text: &str, origin: &str, start: usize, end: usize) -> RetrievalResult {
        RetrievalResult {
            chunk_id: "c1".to_string(),
            document_id: "d1".to_string(),
            text: text.to_string(),
            score: 0.9,
            citation: Citation {
                origin: origin.to_string(),
                char_offset_start: start,
                char_offset_end: end,
            },
        }
    }

    #[test]
    fn test_assemble_carries_passages_and_citations() {
        let ctx = context_with(
            vec![result("chunking splits text", "/docs/a.txt", 0, 300)],
            vec![],
        );
        let req = assemble(&ctx);
        assert_eq!(req.query, "what is chunking?");
        assert_eq!(req.passages.len(), 1);
        assert_eq!(req.passages[0].citation.origin, "/docs/a.txt");
        assert_eq!(req.passages[0].citation.char_offset_end, 300);
        assert!(req.history.is_none());
    }

    #[test]
    fn test_assemble_includes_history_when_present() {
        let ctx = context_with(vec![], vec!["earlier question".to_string()]);
        let req = assemble(&ctx);
        assert_eq!(req.history.as_deref(), Some(&["earlier question".to_string()][..]));
    }

    #[test]
    fn test_prompt_numbers_passages() {
        let ctx = context_with(
            vec![
                result("first passage", "/a.txt", 0, 10),
                result("second passage", "/b.txt", 5, 25),
            ],
            vec![],
        );
        let prompt = HttpGenerationService::build_prompt(&assemble(&ctx));
        assert!(prompt.contains("[1] (/a.txt, chars 0-10)"));
        assert!(prompt.contains("[2] (/b.txt, chars 5-25)"));
        assert!(prompt.contains("Question: what is chunking?"));
    }

    #[tokio::test]
    async fn test_answer_surfaces_generation_unavailable() {
        struct DownService;

        #[async_trait]
        impl GenerationService for DownService {
            async fn summarize(&self, _request: &GenerationRequest) -> Result<String> {
                Err(RagError::GenerationUnavailable("connection refused".into()))
            }
        }

        let ctx = context_with(vec![result("text", "/a.txt", 0, 4)], vec![]);
        let err = answer(&DownService, &ctx).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_answer_returns_response_with_citations() {
        struct EchoService;

        #[async_trait]
        impl GenerationService for EchoService {
            async fn summarize(&self, request: &GenerationRequest) -> Result<String> {
                Ok(format!("summary of {} passages", request.passages.len()))
            }
        }

        let ctx = context_with(
            vec![
                result("one", "/a.txt", 0, 3),
                result("two", "/b.txt", 0, 3),
            ],
            vec![],
        );
        let ans = answer(&EchoService, &ctx).await.unwrap();
        assert_eq!(ans.text, "summary of 2 passages");
        assert_eq!(ans.citations.len(), 2);
    }
}
