use thiserror::Error;

/// Service error codes treated as transient.
pub const THROTTLING_CODES: [&str; 2] = ["ServiceUnavailableException", "ThrottlingException"];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model service is busy ({code}): {message}")]
    Throttled { code: String, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("response stream failed: {0}")]
    Stream(String),
}

impl LlmError {
    /// Only a busy or throttled service is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Throttled { .. })
    }

    pub fn from_service_code(code: Option<&str>, message: String) -> Self {
        match code {
            Some(code) if THROTTLING_CODES.contains(&code) => LlmError::Throttled {
                code: code.to_string(),
                message,
            },
            Some("ValidationException") => LlmError::InvalidRequest(message),
            _ => LlmError::Transport(message),
        }
    }
}
