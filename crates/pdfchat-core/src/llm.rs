//! Chat and embedding model traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Result};

/// Extra request parameters (temperature, max_tokens, ...) passed through to the model
pub type CompletionParameters = serde_json::Map<String, serde_json::Value>;

/// Token accounting reported by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model_id: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Trait for hosted chat models
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request one completion for the given messages
    async fn complete(
        &self,
        messages: &[ChatMessage],
        parameters: &CompletionParameters,
    ) -> Result<ChatCompletion>;

    /// Get the model (deployment) ID being used
    fn model_id(&self) -> &str;
}

/// Trait for hosted embedding models
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a single input text
    async fn embed(&self, input: &str) -> Result<Vec<f32>>;

    /// Get the model (deployment) ID being used
    fn model_id(&self) -> &str;
}
