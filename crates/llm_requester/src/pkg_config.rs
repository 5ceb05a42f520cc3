use serde::Deserialize;

pub const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-sonnet-20240229-v1:0";
pub const DEFAULT_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.1-sonar-large-128k-online";

/// `[llm]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub bedrock: BedrockConfig,
    pub chat: ChatConfig,
    pub retry: RetryConfig,
}

/// `[llm.bedrock]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    pub model_id: String,
    pub region: Option<String>,
    pub anthropic_version: String,
    /// Used when a request does not set its own limit.
    pub max_tokens: u32,
    pub description_max_tokens: u32,
    pub modules_max_tokens: u32,
    pub sequence_max_tokens: u32,
    /// Extended thinking budget for streamed diagram analysis.
    pub thinking_budget_tokens: u32,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_BEDROCK_MODEL.to_string(),
            region: None,
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            max_tokens: 4096,
            description_max_tokens: 2048,
            modules_max_tokens: 5048,
            sequence_max_tokens: 10000,
            thinking_budget_tokens: 2000,
        }
    }
}

/// `[llm.chat]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: 20000,
            temperature: 0.2,
            timeout_secs: 600,
        }
    }
}

/// `[llm.retry]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_jitter_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            max_jitter_secs: 1.0,
        }
    }
}
