//! LLM adapter
//!
//! Renders a prompt, calls the model service, retries transient failures
//! with exponential backoff, and digs a JSON payload out of free-form
//! response text. Every call carries a generated request id for
//! correlation in logs and error payloads.

use crate::cache::{prompt_key, TtlCache};
use crate::error::{ApplyError, Result};
use crate::prompts::{PromptKind, PromptLibrary, PromptVars};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maximum attempts per call, including the first
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff; doubles per retry
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Something that turns a prompt into response text.
///
/// The production implementation is [`ChatCompletionsProvider`]; tests
/// substitute their own.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Provider speaking the OpenAI-compatible chat-completions protocol.
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsProvider {
    /// Create a provider. `base_url` is the API root without the
    /// `/chat/completions` suffix.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApplyError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApplyError::from_llm_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApplyError::from_llm_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ApplyError::LlmFatal {
            message: format!("malformed completion response: {e}"),
            request_id: None,
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ApplyError::LlmTransient {
                status: None,
                message: "empty response from model".into(),
                request_id: None,
            });
        }
        Ok(content)
    }
}

/// Parsed outcome of one LLM call
#[derive(Debug, Clone)]
pub struct LlmOutcome {
    /// The extracted JSON payload
    pub value: Value,
    /// Correlation id for this call
    pub request_id: Uuid,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Whether the response came from the cache
    pub from_cache: bool,
}

/// LLM adapter: template rendering + retry/backoff + JSON extraction,
/// with an optional response cache keyed by (operation, prompt hash).
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptLibrary,
    cache: Option<Arc<TtlCache<Value>>>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            prompts: PromptLibrary::new(),
            cache: None,
        }
    }

    /// Enable response caching with the given TTL.
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(Arc::new(TtlCache::new(ttl)));
        self
    }

    /// Replace the prompt library.
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    /// Render the prompt for `kind`, call the provider, and extract JSON.
    ///
    /// Transient failures are retried with exponential backoff up to
    /// [`MAX_ATTEMPTS`]; parse failures are not retried since the content
    /// is deterministic given the same prompt.
    pub async fn call(&self, kind: PromptKind, vars: &PromptVars) -> Result<LlmOutcome> {
        let request_id = Uuid::new_v4();
        let prompt = self.prompts.render(kind, vars);
        let cache_key = prompt_key(kind.name(), &prompt);

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&cache_key) {
                debug!(%request_id, kind = %kind, "LLM cache hit");
                return Ok(LlmOutcome {
                    value,
                    request_id,
                    attempts: 0,
                    from_cache: true,
                });
            }
        }

        let mut attempts = 0;
        let raw = loop {
            attempts += 1;
            debug!(%request_id, kind = %kind, attempts, prompt_len = prompt.len(), "calling LLM");
            match self.provider.complete(&prompt).await {
                Ok(text) => break text,
                Err(e) if e.is_transient() && attempts < MAX_ATTEMPTS => {
                    let delay = BACKOFF_BASE * 2u32.pow(attempts - 1);
                    warn!(%request_id, kind = %kind, attempts, ?delay, error = %e, "transient LLM failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(%request_id, kind = %kind, attempts, error = %e, "LLM call failed");
                    return Err(e.with_request_id(request_id));
                }
            }
        };

        let value = extract_json(&raw).ok_or_else(|| {
            warn!(%request_id, kind = %kind, response_len = raw.len(), "no JSON in LLM response");
            ApplyError::LlmParse {
                raw: raw.clone(),
                request_id: Some(request_id),
            }
        })?;

        if let Some(cache) = &self.cache {
            cache.insert(cache_key, value.clone());
        }

        Ok(LlmOutcome {
            value,
            request_id,
            attempts,
            from_cache: false,
        })
    }
}

/// Extract a JSON object or array from free-form model output.
///
/// Strategies, in order; the first that yields valid JSON wins:
/// 1. parse the whole text,
/// 2. parse the contents of a fenced code block,
/// 3. parse the first balanced `{...}` or `[...]` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }
    }

    if let Some(span) = balanced_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Some(value);
        }
    }

    None
}

/// Contents of the first ``` fenced block, language tag skipped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// First balanced `{...}` or `[...]` span, aware of strings and escapes.
fn balanced_span(text: &str) -> Option<&str> {
    let open_idx = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[open_idx];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open_idx) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open_idx..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
