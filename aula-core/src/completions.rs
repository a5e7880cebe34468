//! Chat completions for Aula: Gemini `generateContent` behind a
//! `CompletionBackend` trait.
//!
//! Unlike the embedding client this one does NOT retry internally. The chat
//! pipeline walks an ordered model list and moves to the next model only when
//! a call is rate limited, so each `generate()` is a single attempt and a 429
//! surfaces as a typed `RateLimited` error rather than being absorbed by a
//! backoff loop.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over the completion provider.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run a single completion attempt against one model. Rate limiting maps
    /// to `CompletionError::RateLimited`; any other failure is terminal for
    /// the attempt.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, CompletionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Completion generation errors.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the call for quota reasons. Callers treat this
    /// as "try the next model", not as a turn failure.
    #[error("Model {model} is rate limited")]
    RateLimited { model: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Model {model} returned no text")]
    EmptyResponse { model: String },
}

// ============================================================================
// Config
// ============================================================================

/// Gemini completion client configuration.
#[derive(Debug, Clone)]
pub struct CompletionClientConfig {
    pub api_key: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl CompletionClientConfig {
    pub fn new(api_key: Option<String>, temperature: f32, max_output_tokens: u32) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            temperature,
            max_output_tokens,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
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
// GeminiCompletionClient
// ============================================================================

/// Gemini chat completion client over the `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiCompletionClient {
    client: Client,
    config: CompletionClientConfig,
    base_url: String,
}

impl GeminiCompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self, CompletionError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / integration).
    pub fn with_base_url(
        config: CompletionClientConfig,
        base_url: String,
    ) -> Result<Self, CompletionError> {
        if config.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn generate_once(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.config.api_key
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if status.as_u16() == 429 {
            tracing::warn!(model = %model, "Completion model rate limited");
            return Err(CompletionError::RateLimited {
                model: model.to_string(),
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(model = %model, code = code, message = %message, "Completion API error");

            return Err(CompletionError::Api { code, message });
        }

        let generate_response: GenerateResponse = response.json().await?;

        let text: String = generate_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse {
                model: model.to_string(),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionBackend for GeminiCompletionClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        self.generate_once(model, prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> CompletionClientConfig {
        CompletionClientConfig {
            api_key: api_key.to_string(),
            temperature: 0.7,
            max_output_tokens: 1024,
        }
    }

    fn mock_completion_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {
                    "content": {
                        "parts": [{ "text": text }],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_completion_response("¡Hola! Soy Chef Marianito.")),
            )
            .mount(&mock_server)
            .await;

        let result = client.generate("gemini-2.5-flash", "Hola").await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap(), "¡Hola! Soy Chef Marianito.");
    }

    #[tokio::test]
    async fn test_generate_concatenates_multiple_parts() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        let response = serde_json::json!({
            "candidates": [
                {
                    "content": {
                        "parts": [{ "text": "Primera parte. " }, { "text": "Segunda parte." }]
                    }
                }
            ]
        });

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&mock_server)
            .await;

        let result = client.generate("gemini-2.5-flash", "Hola").await.unwrap();
        assert_eq!(result, "Primera parte. Segunda parte.");
    }

    #[tokio::test]
    async fn test_generate_maps_429_to_rate_limited() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Resource has been exhausted" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.generate("gemini-2.5-flash", "Hola").await;

        match result {
            Err(CompletionError::RateLimited { model }) => {
                assert_eq!(model, "gemini-2.5-flash");
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_does_not_retry_on_429() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let _ = client.generate("gemini-2.5-flash", "Hola").await;

        let received = mock_server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 1, "Rate limited call must be a single attempt");
    }

    #[tokio::test]
    async fn test_generate_maps_500_to_api_error() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.generate("gemini-2.5-flash", "Hola").await;

        match result {
            Err(CompletionError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert!(message.contains("Internal server error"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_returns_empty_response_on_no_candidates() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiCompletionClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&mock_server)
            .await;

        let result = client.generate("gemini-2.5-flash", "Hola").await;

        match result {
            Err(CompletionError::EmptyResponse { model }) => {
                assert_eq!(model, "gemini-2.5-flash");
            }
            other => panic!("Expected EmptyResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_fails_with_missing_api_key() {
        let config = test_config("");
        let result = GeminiCompletionClient::new(config);

        assert!(result.is_err(), "Expected error with missing API key");
        match result {
            Err(CompletionError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }
}
