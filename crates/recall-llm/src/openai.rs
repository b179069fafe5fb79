use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, validate_inputs};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Embedding client for the OpenAI `/embeddings` endpoint and compatible servers.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    custom_client: bool,
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("custom_client", &self.custom_client)
            .finish()
    }
}

impl OpenAiEmbedder {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(DEFAULT_TIMEOUT),
            api_key,
            base_url,
            model,
            timeout: DEFAULT_TIMEOUT,
            custom_client: false,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self.custom_client = true;
        self
    }

    /// Deadline applied to each embedding call, covering connect, send and body read.
    ///
    /// A client passed to [`with_client`](Self::with_client) is kept as is; the deadline
    /// still bounds every call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        if !self.custom_client {
            self.client = crate::http::default_client(timeout);
        }
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbedError::from_transport(&e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EmbedError::from_transport(&e, self.timeout))?;

        if !status.is_success() {
            tracing::error!("embedding API error {status}: {text}");
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                message: provider_message(&text),
            });
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;

        into_vectors(resp, texts.len())
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        validate_inputs(texts)?;

        tracing::debug!(
            model = %self.model,
            batch = texts.len(),
            "requesting embeddings"
        );

        match tokio::time::timeout(self.timeout, self.request(texts)).await {
            Ok(result) => result,
            Err(_) => Err(EmbedError::Timeout(self.timeout)),
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

/// Pull the human-readable part out of an error body, falling back to a bounded excerpt.
fn provider_message(body: &str) -> String {
    if let Ok(err) = serde_json::from_str::<ErrorEnvelope>(body) {
        return err.error.message;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn into_vectors(resp: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if resp.data.len() != expected {
        return Err(EmbedError::MalformedResponse(format!(
            "expected {expected} embeddings, got {}",
            resp.data.len()
        )));
    }

    let mut data = resp.data;
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
        if let Some((pos, d)) = data
            .iter()
            .enumerate()
            .find(|(pos, d)| d.index != Some(*pos))
        {
            return Err(EmbedError::MalformedResponse(format!(
                "embedding index {} does not match input position {pos}",
                d.index.unwrap_or_default()
            )));
        }
    }

    data.into_iter()
        .enumerate()
        .map(|(pos, d)| {
            if d.embedding.is_empty() {
                return Err(EmbedError::MalformedResponse(format!(
                    "embedding at position {pos} is empty"
                )));
            }
            Ok(narrow(d.embedding))
        })
        .collect()
}

/// Providers answer in double precision; stored vectors are single precision.
#[expect(clippy::cast_possible_truncation)]
fn narrow(values: Vec<f64>) -> Vec<f32> {
    values.into_iter().map(|v| v as f32).collect()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_embedder() -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            "sk-test-key".into(),
            "https://api.openai.com/v1".into(),
            "text-embedding-ada-002".into(),
        )
    }

    #[test]
    fn new_stores_fields() {
        let e = test_embedder();
        assert_eq!(e.api_key, "sk-test-key");
        assert_eq!(e.base_url, "https://api.openai.com/v1");
        assert_eq!(e.model(), "text-embedding-ada-002");
        assert_eq!(e.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let e = OpenAiEmbedder::new("k".into(), "http://localhost:8000/v1//".into(), "m".into());
        assert_eq!(e.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let dbg = format!("{:?}", test_embedder());
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("sk-test-key"));
    }

    #[test]
    fn with_timeout_overrides_default() {
        let e = test_embedder().with_timeout(Duration::from_secs(2));
        assert_eq!(e.timeout, Duration::from_secs(2));
        assert!(!e.custom_client);
    }

    #[test]
    fn with_timeout_keeps_injected_client() {
        let e = test_embedder()
            .with_client(reqwest::Client::new())
            .with_timeout(Duration::from_secs(2));
        assert!(e.custom_client);
        assert_eq!(e.timeout, Duration::from_secs(2));
    }

    #[test]
    fn request_serializes_batched_input() {
        let texts = vec!["a".to_owned(), "b".to_owned()];
        let body = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &texts,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"model":"text-embedding-3-small","input":["a","b"]}"#
        );
    }

    #[test]
    fn response_narrows_to_f32() {
        let json = r#"{"data":[{"embedding":[0.1,0.2,0.30000000000000004]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = into_vectors(resp, 1).unwrap();
        assert_eq!(vectors, vec![vec![0.1_f32, 0.2, 0.3]]);
    }

    #[test]
    fn response_reordered_by_index() {
        let json = r#"{"data":[
            {"index":1,"embedding":[2.0]},
            {"index":0,"embedding":[1.0]}
        ]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = into_vectors(resp, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn response_duplicate_index_is_malformed() {
        let json = r#"{"data":[
            {"index":0,"embedding":[1.0]},
            {"index":0,"embedding":[2.0]}
        ]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let err = into_vectors(resp, 2).unwrap_err();
        assert!(matches!(err, EmbedError::MalformedResponse(_)));
    }

    #[test]
    fn response_out_of_range_index_is_malformed() {
        let json = r#"{"data":[
            {"index":0,"embedding":[1.0]},
            {"index":5,"embedding":[2.0]}
        ]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(into_vectors(resp, 2).is_err());
    }

    #[test]
    fn response_count_mismatch_is_malformed() {
        let json = r#"{"data":[{"embedding":[1.0]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let err = into_vectors(resp, 2).unwrap_err();
        assert!(matches!(err, EmbedError::MalformedResponse(_)));
    }

    #[test]
    fn response_empty_vector_is_malformed() {
        let json = r#"{"data":[{"embedding":[]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(into_vectors(resp, 1).is_err());
    }

    #[test]
    fn provider_message_prefers_error_envelope() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(provider_message(body), "Incorrect API key provided");
    }

    #[test]
    fn provider_message_truncates_raw_body() {
        let body = "x".repeat(2000);
        assert_eq!(provider_message(&body).len(), MAX_ERROR_BODY_CHARS);
    }

    #[tokio::test]
    async fn embed_empty_text_fails_before_network() {
        // Port 1 is never listening; an InvalidInput result proves no request was attempted.
        let e = OpenAiEmbedder::new("k".into(), "http://127.0.0.1:1".into(), "m".into());
        let err = e.embed(&[String::new()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn embed_unreachable_endpoint_is_unavailable() {
        let e = OpenAiEmbedder::new("k".into(), "http://127.0.0.1:1".into(), "m".into());
        let err = e.embed(&["hello".to_owned()]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::Unavailable(_) | EmbedError::Timeout(_)
        ));
    }

    #[tokio::test]
    #[ignore = "requires RECALL_OPENAI_API_KEY env var"]
    async fn integration_openai_embed() {
        let api_key =
            std::env::var("RECALL_OPENAI_API_KEY").expect("RECALL_OPENAI_API_KEY must be set");
        let e = OpenAiEmbedder::new(
            api_key,
            "https://api.openai.com/v1".into(),
            "text-embedding-3-small".into(),
        );
        let vectors = e
            .embed(&["Hello".to_owned(), "world".to_owned()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 1536);
    }
}
