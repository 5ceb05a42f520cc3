use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::{Value, json};

use crate::pkg_config::ChatConfig;
use crate::{LlmClient, LlmError, LlmRequest};

/// OpenAI compatible `/chat/completions` endpoint with bearer auth.
pub struct ChatCompletionsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionsProvider {
    pub fn new(config: &ChatConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Self::with_http_client(http, config)
    }

    pub fn with_http_client(http: reqwest::Client, config: &ChatConfig) -> Result<Self, LlmError> {
        info!(
            "Creating chat completions provider with model: {} at {}",
            config.model, config.endpoint
        );
        if config.api_key.trim().is_empty() || config.api_key == "your_api_key_here" {
            return Err(LlmError::InvalidRequest(
                "chat completions API key is not set; configure llm.chat.api_key".to_string(),
            ));
        }
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        if request.image.is_some() {
            return Err(LlmError::InvalidRequest(
                "chat completions provider does not accept image input".to_string(),
            ));
        }
        let payload = build_chat_payload(&self.model, request, self.max_tokens, self.temperature);
        debug!("Posting chat completion, prompt length: {} chars", request.prompt.len());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat completion failed with status {}: {}", status, body);
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("response body is not JSON: {}", e)))?;
        let content = extract_message_content(&body)?;
        info!("Chat completion received, length: {} chars", content.len());
        Ok(content)
    }
}

pub fn build_chat_payload(model: &str, request: &LlmRequest, max_tokens: u32, temperature: f32) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system.as_deref().unwrap_or_default() },
            { "role": "user", "content": request.prompt },
        ],
        "max_tokens": request.max_tokens.unwrap_or(max_tokens),
        "temperature": temperature,
    })
}

/// `choices[0].message.content` with escaped `\n` sequences turned into newlines.
pub fn extract_message_content(body: &Value) -> Result<String, LlmError> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(|content| content.replace("\\n", "\n"))
        .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_has_system_and_user_messages() {
        let request = LlmRequest::new("write a stack").with_system("You are an expert");
        let payload = build_chat_payload("sonar", &request, 20000, 0.2);

        assert_eq!(payload["model"], "sonar");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][0]["content"], "You are an expert");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][1]["content"], "write a stack");
        assert_eq!(payload["max_tokens"], 20000);
        assert!((payload["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn content_unescapes_newlines() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "line one\\nline two" } }]
        });
        assert_eq!(extract_message_content(&body).unwrap(), "line one\nline two");
    }

    #[test]
    fn missing_content_is_malformed() {
        let body = json!({ "choices": [] });
        assert!(matches!(
            extract_message_content(&body),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn rejects_placeholder_key() {
        let config = ChatConfig {
            api_key: "your_api_key_here".into(),
            ..ChatConfig::default()
        };
        assert!(ChatCompletionsProvider::new(&config).is_err());
    }
}
