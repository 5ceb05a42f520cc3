//! Single-call diagram analysis, streamed or not.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Result;
use llm_requester::{
    retry_with_backoff, ImageInput, LlmClient, LlmError, LlmRequest, RetryPolicy, StreamDelta, StreamingLlmClient,
};
use log::{error, info};
use prompt_builder::{keys, PromptStore};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Which streamed analysis is running. Each kind has its own prompt and
/// its own event type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Analysis,
    CdkModules,
    Optimization,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Analysis => "analysis",
            AnalysisKind::CdkModules => "cdk_modules",
            AnalysisKind::Optimization => "optimization",
        }
    }

    pub fn prompt_key(self) -> &'static str {
        match self {
            AnalysisKind::Analysis => keys::ANALYSIS,
            AnalysisKind::CdkModules => keys::CDK_MODULES,
            AnalysisKind::Optimization => keys::OPTIMIZATION,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AnalysisKind::Analysis => "Analysis",
            AnalysisKind::CdkModules => "CDK modules analysis",
            AnalysisKind::Optimization => "Optimization",
        }
    }

    // plain analysis events carry no prefix
    fn event_prefix(self) -> &'static str {
        match self {
            AnalysisKind::Analysis => "",
            AnalysisKind::CdkModules => "cdk_modules_",
            AnalysisKind::Optimization => "optimization_",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a client asked for. `Analyze` runs the architecture analysis and
/// then the CDK module breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisAction {
    Analyze,
    CdkModules,
    Optimize,
}

impl AnalysisAction {
    pub fn kinds(self) -> &'static [AnalysisKind] {
        match self {
            AnalysisAction::Analyze => &[AnalysisKind::Analysis, AnalysisKind::CdkModules],
            AnalysisAction::CdkModules => &[AnalysisKind::CdkModules],
            AnalysisAction::Optimize => &[AnalysisKind::Optimization],
        }
    }
}

impl FromStr for AnalysisAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "analyze" => Ok(AnalysisAction::Analyze),
            "cdk_modules" => Ok(AnalysisAction::CdkModules),
            "optimize" => Ok(AnalysisAction::Optimize),
            other => Err(format!(
                "unsupported action '{}', expected analyze, cdk_modules or optimize",
                other
            )),
        }
    }
}

/// Messages pushed to a client while an analysis streams.
///
/// Serialized as `{"type": ..., "content": ...}` where the type is
/// `stream`, `thinking_stream` or `complete`, prefixed with the kind for
/// everything but plain analysis (`cdk_modules_stream`,
/// `optimization_thinking_stream`). Errors are always `{"type": "error"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    Stream { kind: AnalysisKind, content: String },
    ThinkingStream { kind: AnalysisKind, content: String },
    Complete { kind: AnalysisKind },
    Error { kind: AnalysisKind, message: String },
}

impl AnalysisEvent {
    pub fn event_type(&self) -> String {
        match self {
            AnalysisEvent::Stream { kind, .. } => format!("{}stream", kind.event_prefix()),
            AnalysisEvent::ThinkingStream { kind, .. } => format!("{}thinking_stream", kind.event_prefix()),
            AnalysisEvent::Complete { kind } => format!("{}complete", kind.event_prefix()),
            AnalysisEvent::Error { .. } => "error".to_string(),
        }
    }
}

impl Serialize for AnalysisEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.event_type())?;
        match self {
            AnalysisEvent::Stream { content, .. } | AnalysisEvent::ThinkingStream { content, .. } => {
                map.serialize_entry("content", content)?;
            }
            AnalysisEvent::Complete { .. } => {}
            AnalysisEvent::Error { message, .. } => {
                map.serialize_entry("message", message)?;
            }
        }
        map.end()
    }
}

/// Stream text sent before sleeping after failed attempt `failed_attempt`.
pub fn retry_notice(failed_attempt: u32, delay_secs: u64) -> String {
    format!(
        "\n\n⏳ Service busy, retrying in {}s... (attempt {})\n\n",
        delay_secs, failed_attempt
    )
}

/// Streams one analysis to `sink`, retrying while the service is busy.
///
/// Text and thinking fragments become `Stream` and `ThinkingStream`
/// events. Ends with [`AnalysisEvent::Complete`] on success or
/// [`AnalysisEvent::Error`] once retries are exhausted or a non-retryable
/// error occurs. Returns the full text of the successful attempt.
pub async fn analyze_diagram(
    client: &dyn StreamingLlmClient,
    kind: AnalysisKind,
    request: &LlmRequest,
    policy: &RetryPolicy,
    sink: &(dyn Fn(AnalysisEvent) + Send + Sync),
) -> Result<String, LlmError> {
    let on_delta = |delta: StreamDelta<'_>| match delta {
        StreamDelta::Text(text) => sink(AnalysisEvent::Stream {
            kind,
            content: text.to_string(),
        }),
        StreamDelta::Thinking(text) => sink(AnalysisEvent::ThinkingStream {
            kind,
            content: text.to_string(),
        }),
    };
    let on_delta: &(dyn for<'s> Fn(StreamDelta<'s>) + Send + Sync) = &on_delta;

    let result = retry_with_backoff(
        policy,
        |failed_attempt, delay| {
            sink(AnalysisEvent::Stream {
                kind,
                content: retry_notice(failed_attempt, delay.as_secs()),
            })
        },
        move |_| client.complete_streaming(request, on_delta),
    )
    .await;

    match result {
        Ok(text) => {
            info!("{} streamed {} chars", kind.label(), text.len());
            sink(AnalysisEvent::Complete { kind });
            Ok(text)
        }
        Err(err) => {
            error!("{} failed: {}", kind.label(), err);
            sink(AnalysisEvent::Error {
                kind,
                message: format!("{} failed: {}", kind.label(), err),
            });
            Err(err)
        }
    }
}

/// Token limits applied to every streamed analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
}

/// Runs every analysis the action names, in order, each with its own
/// prompt and the same image. The CDK module breakdown that follows an
/// architecture analysis gets that analysis appended to its prompt.
///
/// Stops at the first failing kind; its error event has already been sent.
pub async fn run_analysis_action(
    client: &dyn StreamingLlmClient,
    prompts: &PromptStore,
    action: AnalysisAction,
    image: &ImageInput,
    limits: AnalysisLimits,
    policy: &RetryPolicy,
    sink: &(dyn Fn(AnalysisEvent) + Send + Sync),
) -> Result<Vec<(AnalysisKind, String)>> {
    let mut results: Vec<(AnalysisKind, String)> = Vec::with_capacity(action.kinds().len());
    for &kind in action.kinds() {
        let mut prompt = prompts.get(kind.prompt_key())?.to_string();
        if kind == AnalysisKind::CdkModules {
            if let Some((_, analysis)) = results.iter().find(|(k, _)| *k == AnalysisKind::Analysis) {
                prompt = format!("{}\n\nArchitecture analysis:\n{}", prompt, analysis);
            }
        }

        let mut request = LlmRequest::new(prompt)
            .with_image(image.clone())
            .with_max_tokens(limits.max_tokens);
        if let Some(budget) = limits.thinking_budget {
            request = request.with_thinking(budget);
        }

        let text = analyze_diagram(client, kind, &request, policy, sink).await?;
        results.push((kind, text));
    }
    Ok(results)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub response_text: String,
    /// Wall-clock seconds, formatted with two decimals.
    pub execution_time: String,
}

/// One multimodal request, timed.
pub async fn describe_diagram(client: &dyn LlmClient, request: &LlmRequest) -> Result<AnalysisResponse> {
    let started = Instant::now();
    let response_text = client.complete(request).await?;
    let elapsed = started.elapsed().as_secs_f64();
    info!("Diagram described in {:.2}s", elapsed);
    Ok(AnalysisResponse {
        response_text,
        execution_time: format!("{:.2}", elapsed),
    })
}
