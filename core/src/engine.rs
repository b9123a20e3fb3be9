use async_trait::async_trait;

use crate::identity::SessionKey;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("reasoning engine is not configured: {0}")]
    NotConfigured(String),
    #[error("reasoning engine request failed: {0}")]
    Transport(String),
    #[error("reasoning engine returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("reasoning engine returned a malformed response: {0}")]
    Malformed(String),
    #[error("no final answer after {0} tool-call rounds")]
    ToolBudgetExhausted(usize),
}

/// Answers a prompt, possibly after running read-only inspection tools.
///
/// Conversation memory lives inside the implementation, keyed by the session
/// key. Callers never lock around it; concurrent calls for the same key are
/// the implementation's concern.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Session-scoped chat: the prompt and answer join the key's history.
    async fn chat(&self, session: &SessionKey, prompt: &str) -> Result<String, EngineError>;

    /// One-off chat with no history read or written.
    async fn chat_stateless(&self, prompt: &str) -> Result<String, EngineError>;
}
