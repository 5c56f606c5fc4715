//! OpenAI-compatible embeddings client

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Result, RetrievalError, ServiceFailure};

/// Blocking embeddings client for OpenAI-compatible `/embeddings` endpoints
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_attempts: usize,
}

impl OpenAiEmbedder {
    /// Build a client from explicit configuration
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::config("missing OPENAI_API_KEY"))?;
        if config.model.trim().is_empty() {
            return Err(RetrievalError::config("missing embedding model name"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth_headers(api_key)?)
            .build()
            .map_err(|e| RetrievalError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_attempts: config.max_attempts.max(1),
        })
    }

    fn send(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let mut attempt = 1;
        loop {
            let failure = match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().map_err(|e| {
                        RetrievalError::embedding(classify_transport(&e), e.to_string())
                    })?;
                    return parse_response(&body, inputs.len());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    (
                        classify_status(status),
                        retryable_status(status),
                        format!("{}: {}", status, body),
                    )
                }
                Err(e) => (classify_transport(&e), true, e.to_string()),
            };

            let (kind, retryable, message) = failure;
            if retryable && attempt < self.max_attempts {
                log::warn!(
                    "Embedding request failed (attempt {}/{}): {}",
                    attempt,
                    self.max_attempts,
                    message
                );
                thread::sleep(backoff(attempt));
                attempt += 1;
                continue;
            }
            return Err(RetrievalError::embedding(kind, message));
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.send(texts)
    }
}

pub(crate) fn auth_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth).map_err(|_| RetrievalError::config("invalid API key"))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Map an HTTP error status to a failure kind
pub(crate) fn classify_status(status: StatusCode) -> ServiceFailure {
    if status.is_server_error() {
        ServiceFailure::Upstream
    } else if status.is_client_error() {
        ServiceFailure::Rejected
    } else {
        ServiceFailure::Malformed
    }
}

/// Map a transport-level error to a failure kind
pub(crate) fn classify_transport(err: &reqwest::Error) -> ServiceFailure {
    if err.is_decode() || err.is_body() {
        ServiceFailure::Malformed
    } else {
        ServiceFailure::Unreachable
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        RetrievalError::embedding(
            ServiceFailure::Malformed,
            format!("failed to parse embedding response: {}", e),
        )
    })?;
    parsed.data.sort_by_key(|entry| entry.index);

    if parsed.data.len() != expected {
        return Err(RetrievalError::embedding(
            ServiceFailure::Malformed,
            format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            ),
        ));
    }

    let dimension = parsed.data.first().map_or(0, |d| d.embedding.len());
    if dimension == 0 || parsed.data.iter().any(|d| d.embedding.len() != dimension) {
        return Err(RetrievalError::embedding(
            ServiceFailure::Malformed,
            "provider returned empty or ragged embeddings",
        ));
    }

    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
