//! Embeddings for Aula: Gemini `embedContent` behind an `EmbeddingBackend` trait.
//!
//! The catalog and the chat pipeline both embed through this module. Queries
//! are embedded with the `RETRIEVAL_QUERY` task type, course listings with
//! `RETRIEVAL_DOCUMENT`. A failed embedding is a hard error: the chat turn
//! that needed it is aborted by the caller, so there is no degraded
//! "no vector" path here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Gemini embedding dimensions used across the schema (`vector(768)`).
pub const EMBEDDING_DIMENSIONS: usize = 768;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over the embedding provider.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed document text (course listings).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a search/chat query. Backends that support task-type hints use
    /// `RETRIEVAL_QUERY` here; the default delegates to `embed()`.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(text).await
    }

    /// Returns the embedding dimension (768 for Gemini).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Task type hint for the embedding API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
}

/// Embedding generation errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config
// ============================================================================

/// Gemini embedding client configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            dimensions,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiEmbeddingClient
// ============================================================================

/// Gemini embedding client over the Embeddings API, with exponential-backoff
/// retry around each call.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
    base_url: String,
}

impl GeminiEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / integration).
    pub fn with_base_url(
        config: EmbeddingClientConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Generate an embedding with a specific task type, retrying transient
    /// failures with jittered exponential backoff.
    pub async fn embed_with_task(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.embed_once(text, task_type)).await;

        match result {
            Ok(vec) => Ok(vec),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn embed_once(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = EmbedRequest {
            model: format!("models/{}", self.config.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: Some(task_type),
            output_dimensionality: Some(self.config.dimensions),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Embedding API error");

            return Err(EmbeddingError::Api { code, message });
        }

        let embed_response: EmbedResponse = response.json().await?;

        let values = embed_response.embedding.values;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalQuery).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
