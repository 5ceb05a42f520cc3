use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use log::{debug, error, info};
use serde_json::{Value, json};

use crate::pkg_config::BedrockConfig;
use crate::{LlmClient, LlmError, LlmRequest, StreamDelta, StreamingLlmClient, UNEXPECTED_RESPONSE_FORMAT};

/// Anthropic messages API on Amazon Bedrock.
pub struct BedrockProvider {
    client: Client,
    model_id: String,
    anthropic_version: String,
    default_max_tokens: u32,
}

impl BedrockProvider {
    pub fn new(client: Client, config: &BedrockConfig) -> Self {
        info!("Creating Bedrock provider with model: {}", config.model_id);
        Self {
            client,
            model_id: config.model_id.clone(),
            anthropic_version: config.anthropic_version.clone(),
            default_max_tokens: config.max_tokens,
        }
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, config: &BedrockConfig) -> Self {
        Self::new(Client::new(sdk_config), config)
    }

    fn encode_body(&self, request: &LlmRequest) -> Result<Blob, LlmError> {
        let body = build_request_body(request, &self.anthropic_version, self.default_max_tokens);
        serde_json::to_vec(&body)
            .map(Blob::new)
            .map_err(|e| LlmError::InvalidRequest(format!("failed to encode request body: {}", e)))
    }
}

#[async_trait]
impl LlmClient for BedrockProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        debug!(
            "Invoking {} with prompt length {} chars (image: {})",
            self.model_id,
            request.prompt.len(),
            request.image.is_some()
        );
        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(self.encode_body(request)?)
            .send()
            .await
            .map_err(|e| {
                let err = map_sdk_error(e);
                error!("Bedrock invoke_model failed: {}", err);
                err
            })?;

        let body: Value = serde_json::from_slice(output.body.as_ref())
            .map_err(|e| LlmError::MalformedResponse(format!("response body is not JSON: {}", e)))?;
        let text = first_text_block(&body);
        info!("Bedrock response received, length: {} chars", text.len());
        Ok(text)
    }
}

#[async_trait]
impl StreamingLlmClient for BedrockProvider {
    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_delta: &(dyn for<'s> Fn(StreamDelta<'s>) + Send + Sync),
    ) -> Result<String, LlmError> {
        let mut output = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(self.encode_body(request)?)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let mut full_text = String::new();
        while let Some(event) = output.body.recv().await.map_err(map_stream_error)? {
            let ResponseStream::Chunk(part) = event else {
                continue;
            };
            let Some(bytes) = part.bytes() else {
                continue;
            };
            match parse_stream_chunk(bytes.as_ref())? {
                StreamChunk::Text(text) => {
                    on_delta(StreamDelta::Text(&text));
                    full_text.push_str(&text);
                }
                StreamChunk::Thinking(thinking) => on_delta(StreamDelta::Thinking(&thinking)),
                StreamChunk::Stop => break,
                StreamChunk::Other => {}
            }
        }
        info!("Bedrock stream finished, length: {} chars", full_text.len());
        Ok(full_text)
    }
}

/// Anthropic messages body. The image block, when present, follows the text.
pub fn build_request_body(request: &LlmRequest, anthropic_version: &str, default_max_tokens: u32) -> Value {
    let mut content = vec![json!({ "type": "text", "text": request.prompt })];
    if let Some(image) = &request.image {
        content.push(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": image.media_type,
                "data": image.data_base64,
            }
        }));
    }

    let mut body = json!({
        "anthropic_version": anthropic_version,
        "max_tokens": request.max_tokens.unwrap_or(default_max_tokens),
        "messages": [{ "role": "user", "content": content }],
    });
    if let Some(system) = &request.system {
        body["system"] = json!(system);
    }
    if let Some(budget) = request.thinking_budget {
        body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
    }
    body
}

/// Text of the first text block, or [`UNEXPECTED_RESPONSE_FORMAT`].
pub fn first_text_block(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.iter().find_map(|block| block.get("text").and_then(Value::as_str)))
        .map(str::to_string)
        .unwrap_or_else(|| UNEXPECTED_RESPONSE_FORMAT.to_string())
}

#[derive(Debug, PartialEq, Eq)]
pub enum StreamChunk {
    Text(String),
    Thinking(String),
    Stop,
    Other,
}

pub fn parse_stream_chunk(bytes: &[u8]) -> Result<StreamChunk, LlmError> {
    let chunk: Value = serde_json::from_slice(bytes)
        .map_err(|e| LlmError::Stream(format!("chunk is not JSON: {}", e)))?;
    let chunk_type = chunk.get("type").and_then(Value::as_str).unwrap_or_default();
    match chunk_type {
        "content_block_delta" => {
            let delta = chunk.get("delta");
            let field = |name: &str| delta.and_then(|d| d.get(name)).and_then(Value::as_str);
            match field("type") {
                Some("text_delta") => Ok(field("text").map_or(StreamChunk::Other, |t| StreamChunk::Text(t.to_string()))),
                Some("thinking_delta") => Ok(field("thinking")
                    .filter(|t| !t.is_empty())
                    .map_or(StreamChunk::Other, |t| StreamChunk::Thinking(t.to_string()))),
                _ => Ok(StreamChunk::Other),
            }
        }
        "message_stop" => Ok(StreamChunk::Stop),
        _ => Ok(StreamChunk::Other),
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> LlmError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    if matches!(err, SdkError::ConstructionFailure(_)) {
        return LlmError::InvalidRequest(message);
    }
    LlmError::from_service_code(err.code(), message)
}

fn map_stream_error<E, R>(err: SdkError<E, R>) -> LlmError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match map_sdk_error(err) {
        throttled @ LlmError::Throttled { .. } => throttled,
        other => LlmError::Stream(other.to_string()),
    }
}
