//! Reasoning service client
//!
//! The orchestrator talks to the natural-language reasoning service through
//! the [`ReasoningClient`] trait so tests can inject stubs and the transport
//! can be swapped without touching task logic. The shipped implementation
//! targets OpenRouter's chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OpenRouter direct API URL (BYOK mode)
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const MAX_TOKENS: u32 = 4096;

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// Failure taxonomy at the reasoning-service boundary. Everything the
/// service can do wrong collapses into these two cases; the orchestrator
/// treats both as grounds for fallback substitution.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning service call timed out")]
    Timeout,
    #[error("reasoning service error: {0}")]
    Service(String),
}

/// Model tiers for analysis tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// Fast, cheap model for narrow extraction tasks
    Speed,
    /// Good reasoning at medium cost; the default analysis tier
    Balanced,
    /// Best reasoning, reserved for the synthesis pass
    Smart,
}

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Speed => "openai/gpt-oss-120b",
            Model::Balanced => "anthropic/claude-sonnet-4.5",
            Model::Smart => "anthropic/claude-opus-4.5",
        }
    }
}

/// Abstract reasoning capability: a prompt and a model id in, free text out.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ReasoningError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Extract a retry-after hint from a rate-limit response body, if present
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    if let Some(pos) = text_lower.find("retry") {
        let after_retry = &text_lower[pos..];
        for word in after_retry.split_whitespace().skip(1).take(5) {
            if let Ok(secs) = word
                .trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
            {
                if secs > 0 && secs < 300 {
                    return Some(secs);
                }
            }
        }
    }
    None
}

/// HTTP-backed client for OpenRouter. Cheap to clone; holds a pooled
/// `reqwest::Client` internally.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ReasoningClient for OpenRouterClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ReasoningError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let mut retry_count = 0;
        loop {
            let response = self
                .http
                .post(OPENROUTER_URL)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ReasoningError::Timeout
                    } else {
                        ReasoningError::Service(e.to_string())
                    }
                })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ReasoningError::Service(e.to_string()))?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    ReasoningError::Service(format!("unparseable service response: {}", e))
                })?;
                return Ok(parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default());
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let retry_after = parse_retry_after(&text).unwrap_or_else(|| {
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                });
                tracing::warn!(
                    retry_after_secs = retry_after,
                    attempt = retry_count,
                    "reasoning service rate limited, backing off"
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(retry_after)).await;
                continue;
            }

            return Err(ReasoningError::Service(match status.as_u16() {
                401 => "invalid API key".to_string(),
                429 => format!("rate limited after {} retries", retry_count),
                500..=599 => format!("service error ({})", status),
                _ => format!("API error {}: {}", status, truncate_str(&text, 200)),
            }));
        }
    }
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}
