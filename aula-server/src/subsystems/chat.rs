//! Chat turn pipeline for the Chef Marianito assistant.
//!
//! One call to [`ChatPipeline::answer_query`] runs a full turn:
//! 1. Load session history (a store failure degrades to an empty history)
//! 2. Embed the query text alone
//! 3. Similarity-search active courses for context
//! 4. Render the prompt (persona, history, context, query)
//! 5. Generate a completion, walking the model list on rate limits
//! 6. Append the user and assistant messages, keep the newest 30
//! 7. Upsert the history row (a failure here is logged, not fatal)
//!
//! Embedding, retrieval, and completion failures abort the turn; the caller
//! then receives the fixed apology string instead of a raw error. The answer
//! is computed before persistence, so a failed upsert never changes what the
//! user sees.

use aula_core::completions::{CompletionBackend, CompletionError};
use aula_core::config::{ChatConfig, CompletionConfig, RetrievalConfig};
use aula_core::embeddings::{EmbeddingBackend, EmbeddingError};
use aula_core::models::{truncate_window, ChatMessage};
use aula_core::prompt::{format_context, render_prompt, FALLBACK_REPLY};
use chrono::Utc;
use thiserror::Error;

use super::history::ConversationStore;
use super::retrieve::{CourseRetriever, RetrievalError};

/// Reasons a chat turn aborts. None of these reach the end user directly;
/// [`ChatPipeline::answer_query`] maps them all to [`FALLBACK_REPLY`].
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Context retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Completion failed on model {model}: {source}")]
    Completion {
        model: String,
        source: CompletionError,
    },

    #[error("All {attempts} completion models were rate limited")]
    ModelsExhausted { attempts: usize },
}

/// Collaborators and tuning for one chat turn. Built per request from the
/// shared server state; holds references only.
pub struct ChatPipeline<'a> {
    pub embedder: &'a dyn EmbeddingBackend,
    pub completer: &'a dyn CompletionBackend,
    pub retriever: &'a dyn CourseRetriever,
    pub store: &'a dyn ConversationStore,
    pub completion: &'a CompletionConfig,
    pub retrieval: &'a RetrievalConfig,
    pub chat: &'a ChatConfig,
}

impl ChatPipeline<'_> {
    /// Answer a user query, returning the apology string on any aborting
    /// failure. Callers can always hand the result straight to the user.
    pub async fn answer_query(&self, query: &str, session_id: &str) -> String {
        match self.answer_query_inner(query, session_id).await {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_rate_limit_exhaustion() {
                    tracing::warn!(session_id = %session_id, error = %e, "Chat turn rate limited on every model");
                } else {
                    tracing::error!(session_id = %session_id, error = %e, "Chat turn failed");
                }
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// The turn itself, with typed errors. Exposed for tests that assert on
    /// failure modes rather than the user-facing fallback.
    pub async fn answer_query_inner(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<String, TurnError> {
        let mut history = match self.store.load(session_id).await {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "History unavailable, answering with empty history"
                );
                Vec::new()
            }
        };

        let query_vector = self.embedder.embed_query(query).await?;

        let matches = self
            .retriever
            .match_courses(
                &query_vector,
                self.retrieval.similarity_threshold,
                self.retrieval.max_results,
            )
            .await?;

        let context = format_context(&matches);
        let prompt = render_prompt(&history, &context, query);

        let reply = self.generate_with_fallback(&prompt).await?;

        history.push(ChatMessage::user(query));
        history.push(ChatMessage::assistant(reply.as_str()));
        truncate_window(&mut history, self.chat.history_window);

        if let Err(e) = self.store.upsert(session_id, &history, Utc::now()).await {
            tracing::error!(
                session_id = %session_id,
                error = %e,
                "Failed to persist chat history; turn result is unaffected"
            );
        }

        Ok(reply)
    }

    /// Walk the configured model list in order. Rate-limited models yield to
    /// the next one; any other failure aborts the chain immediately.
    async fn generate_with_fallback(&self, prompt: &str) -> Result<String, TurnError> {
        for model in &self.completion.models {
            match self.completer.generate(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(CompletionError::RateLimited { .. }) => {
                    tracing::warn!(model = %model, "Model rate limited, trying next in list");
                    continue;
                }
                Err(e) => {
                    return Err(TurnError::Completion {
                        model: model.clone(),
                        source: e,
                    });
                }
            }
        }

        Err(TurnError::ModelsExhausted {
            attempts: self.completion.models.len(),
        })
    }
}

impl TurnError {
    /// True when every configured model hit its rate limit this turn.
    pub fn is_rate_limit_exhaustion(&self) -> bool {
        matches!(self, TurnError::ModelsExhausted { .. })
    }
}

// ============================================================================
// TESTS
// ============================================================================
