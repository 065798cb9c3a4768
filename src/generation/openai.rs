//! OpenAI-compatible chat completion client with SSE streaming

use super::{FragmentStream, GenerationError, GenerationRequest, TextGenerator};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for the generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token, never serialized
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts before a connection-phase failure is reported
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base backoff in milliseconds, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> usize {
    4096
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Generator backed by an OpenAI-compatible `/v1/chat/completions` endpoint
pub struct OpenAiCompatibleGenerator {
    client: Client,
    config: GenerationConfig,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Initialization(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn build_request(&self, request: &GenerationRequest, stream: bool) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream,
        }
    }

    /// Send with retries on transient failures; never retries once a response is accepted
    async fn send(
        &self,
        body: &ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, GenerationError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(self.config.retry_backoff_ms << attempt);
                debug!(attempt, ?backoff, "Retrying generation request");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            let mut req = self.client.post(&self.config.endpoint).json(body);
            if let Some(api_key) = &self.config.api_key {
                req = req.bearer_auth(api_key.expose_secret());
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                sent = req.send() => sent,
            };

            let error = match sent {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    GenerationError::Api { status, body }
                }
                Err(e) => GenerationError::Network(e.to_string()),
            };

            if !error.is_transient() {
                return Err(error);
            }
            last_error = Some(error);
        }

        warn!(attempts, "Generation request failed after retries");
        Err(last_error.unwrap_or_else(|| GenerationError::Network("no attempt made".to_string())))
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<String, GenerationError> {
        let body = self.build_request(&request, false);
        let response = self.send(&body, &cancel).await?;

        let parsed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            parsed = response.json::<ChatCompletionResponse>() => parsed,
        };
        let parsed = parsed.map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("No choices in response".to_string()))
    }

    async fn generate_stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, GenerationError> {
        let body = self.build_request(&request, true);
        let response = self.send(&body, &cancel).await?;
        let mut events = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = events.next() => next,
                };
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        yield Err(GenerationError::Network(e.to_string()));
                        break;
                    }
                    None => break,
                };

                match parse_sse_data(&event.data) {
                    Ok(SseEvent::Content(fragment)) => yield Ok(fragment),
                    Ok(SseEvent::Done) => break,
                    Ok(SseEvent::Skip) => {}
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Meaning of one server-sent event's data payload
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Content(String),
    Done,
    Skip,
}

pub(crate) fn parse_sse_data(data: &str) -> Result<SseEvent, GenerationError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map_or(SseEvent::Skip, SseEvent::Content))
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}
