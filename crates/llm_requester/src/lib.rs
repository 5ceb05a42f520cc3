//! LLM round trips used by the diagram pipeline.
//!
//! Two backends are provided: Anthropic models on Amazon Bedrock
//! (multimodal, optionally streamed) and any OpenAI compatible chat
//! completions endpoint. Callers depend on the [`LlmClient`] and
//! [`StreamingLlmClient`] traits so tests can swap in scripted clients.

use async_trait::async_trait;

pub mod bedrock_provider;
pub mod chat_provider;
mod error;
pub mod pkg_config;
pub mod retry;

pub use bedrock_provider::BedrockProvider;
pub use chat_provider::ChatCompletionsProvider;
pub use error::LlmError;
pub use retry::{RetryPolicy, retry_with_backoff};

/// Text returned by the Bedrock backend when the response body has no text block.
pub const UNEXPECTED_RESPONSE_FORMAT: &str = "Unexpected response format";

/// Base64 image attached to a multimodal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub data_base64: String,
    pub media_type: String,
}

/// One prompt round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub image: Option<ImageInput>,
    /// Falls back to the provider's configured default when unset.
    pub max_tokens: Option<u32>,
    /// Extended thinking budget in tokens. Only Bedrock honours it.
    pub thinking_budget: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = Some(budget_tokens);
        self
    }
}

/// One fragment of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDelta<'a> {
    Text(&'a str),
    Thinking(&'a str),
}

/// Request/response text generation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

/// Incremental text generation. `on_delta` sees every fragment in order and
/// the returned string is the concatenation of the text fragments.
#[async_trait]
pub trait StreamingLlmClient: Send + Sync {
    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_delta: &(dyn for<'s> Fn(StreamDelta<'s>) + Send + Sync),
    ) -> Result<String, LlmError>;
}
