
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::{EmbeddingApi, EmbeddingConfig};
use crate::{RagError, Result};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Turns text into an embedding vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text, preserving component order
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier sent with each request
    fn model(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    #[inline]
    fn model(&self) -> &str {
        (**self).model()
    }
}

/// HTTP client for an external embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    endpoint: Url,
    api: EmbeddingApi,
    model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Response of an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f64>,
    #[serde(default)]
    index: usize,
}

/// Response of Ollama's `/api/embed` endpoint
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            api: config.api,
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocking request; [`Embedder::embed`] runs this on the blocking pool
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            "Requesting embedding from {} (model {}, {} bytes)",
            self.endpoint,
            self.model,
            text.len()
        );

        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: text,
        })
        .map_err(|e| RagError::EmbeddingService {
            message: format!("Failed to serialize embedding request: {}", e),
            retryable: false,
        })?;

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            let bearer = format!("Bearer {}", key);
            request = request.header("Authorization", bearer.as_str());
        }

        let response_text = request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| self.service_error(&e))?;

        let vector = self.parse_response(&response_text)?;
        debug!("Received embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    fn parse_response(&self, body: &str) -> Result<Vec<f32>> {
        let components = match self.api {
            EmbeddingApi::OpenAi => {
                let mut response: OpenAiEmbedResponse =
                    serde_json::from_str(body).map_err(|e| malformed_response(&e))?;
                response.data.sort_by_key(|entry| entry.index);
                response.data.into_iter().next().map(|entry| entry.embedding)
            }
            EmbeddingApi::Ollama => {
                let response: OllamaEmbedResponse =
                    serde_json::from_str(body).map_err(|e| malformed_response(&e))?;
                response.embeddings.into_iter().next()
            }
        };

        let components = components.ok_or_else(|| RagError::EmbeddingService {
            message: "Embedding response contained no vectors".to_string(),
            retryable: false,
        })?;

        Ok(narrow_to_f32(&components))
    }

    fn service_error(&self, error: &ureq::Error) -> RagError {
        let retryable = match error {
            ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => true,
            _ => false,
        };

        if retryable {
            warn!("Embedding request to {} failed: {}", self.endpoint, error);
        } else {
            error!("Embedding request to {} rejected: {}", self.endpoint, error);
        }

        RagError::EmbeddingService {
            message: format!("Request to {} failed: {}", self.endpoint, error),
            retryable,
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.embed_blocking(&text))
            .await
            .map_err(|e| RagError::EmbeddingService {
                message: format!("Embedding task failed: {}", e),
                retryable: false,
            })?
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}

fn malformed_response(error: &serde_json::Error) -> RagError {
    RagError::EmbeddingService {
        message: format!("Failed to parse embedding response: {}", error),
        retryable: false,
    }
}

/// Convert service-precision components to single precision, keeping order
#[inline]
pub fn narrow_to_f32(components: &[f64]) -> Vec<f32> {
    components.iter().map(|&c| c as f32).collect()
}

/// Retries retryable embedding failures with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryingEmbedder<E> {
    inner: E,
    attempts: u32,
    initial_delay: Duration,
}

impl<E: Embedder> RetryingEmbedder<E> {
    #[inline]
    pub fn new(inner: E, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            initial_delay: Duration::from_secs(1),
        }
    }

    #[inline]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 1;
        loop {
            match self.inner.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    let delay = self.initial_delay * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                    warn!(
                        "Embedding attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[inline]
    fn model(&self) -> &str {
        self.inner.model()
    }
}
