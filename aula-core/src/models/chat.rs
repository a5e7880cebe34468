use serde::{Deserialize, Serialize};

/// Author of a chat message. Serialized lowercase so the persisted JSONB
/// shape is `{"role":"user","content":"..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn half of a conversation transcript. Immutable once created;
/// list position is conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Keep only the most recent `window` messages, dropping from the front.
/// Idempotent: truncating an already-truncated list is a no-op.
pub fn truncate_window(messages: &mut Vec<ChatMessage>, window: usize) {
    if messages.len() > window {
        let drop = messages.len() - window;
        messages.drain(..drop);
    }
}

// ============================================================================
// TESTS
// ============================================================================
