use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Upstream body snippets carried in errors are capped at this many bytes
pub const MAX_ERROR_SNIPPET_BYTES: usize = 1024;

/// Upstream providers known to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Jan,
    OpenRouter,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Jan, ProviderId::OpenRouter, ProviderId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Jan => "jan",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Human readable provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Jan => "Jan Inference",
            ProviderId::OpenRouter => "OpenRouter",
            ProviderId::Gemini => "Google Gemini",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jan" => Ok(ProviderId::Jan),
            "openrouter" => Ok(ProviderId::OpenRouter),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// A chat message in OpenAI format
///
/// `role` is kept as a string and unknown fields are preserved so that
/// pass-through providers receive the message exactly as the client sent it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(Value::String(content.into())),
            extra: HashMap::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role.eq_ignore_ascii_case("system")
    }

    /// Flatten the message content to plain text
    ///
    /// Array content keeps only `text` parts, joined by newlines.
    pub fn text_content(&self) -> String {
        match &self.content {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => other.to_string(),
        }
    }
}

/// Stop sequences, either a single string or a list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StopSequences {
    Single(String),
    Many(Vec<String>),
}

impl StopSequences {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StopSequences::Single(s) => vec![s],
            StopSequences::Many(v) => v,
        }
    }
}

/// OpenAI chat completion request
///
/// Fields the gateway does not interpret are collected in `extra` and
/// serialized back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            stream: None,
            extra: HashMap::new(),
        }
    }

    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Assistant message inside a completion choice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatChoice {
    pub index: i64,
    pub message: ChatResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Token usage as reported by the upstream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenAI chat completion response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "default_completion_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_completion_object() -> String {
    "chat.completion".to_string()
}

/// Model as published by an OpenAI-compatible `/models` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default = "default_model_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

fn default_model_object() -> String {
    "model".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

/// Errors produced by provider clients
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {snippet}")]
    Upstream {
        provider: ProviderId,
        status: u16,
        snippet: String,
    },

    #[error("{provider} is unreachable: {message}")]
    Unavailable { provider: ProviderId, message: String },

    #[error("{provider} timed out waiting for {during}")]
    Timeout {
        provider: ProviderId,
        during: &'static str,
    },

    #[error("{provider} does not support {capability}")]
    UnsupportedCapability {
        provider: ProviderId,
        capability: &'static str,
    },

    #[error("{provider} returned an unreadable response: {message}")]
    InvalidResponse { provider: ProviderId, message: String },

    #[error("credential for {provider} cannot be sent: {message}")]
    InvalidCredential { provider: ProviderId, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Upstream { provider, .. }
            | ProviderError::Unavailable { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::UnsupportedCapability { provider, .. }
            | ProviderError::InvalidResponse { provider, .. }
            | ProviderError::InvalidCredential { provider, .. } => *provider,
        }
    }

    /// Connect failures and upstream 5xx are worth one more attempt
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::Unavailable { .. } => true,
            ProviderError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a transport error
    ///
    /// The URL is stripped first because Gemini carries the API key in the
    /// query string.
    pub fn from_reqwest(provider: ProviderId, err: reqwest::Error, during: &'static str) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            ProviderError::Timeout { provider, during }
        } else if err.is_decode() {
            ProviderError::InvalidResponse {
                provider,
                message: err.to_string(),
            }
        } else {
            ProviderError::Unavailable {
                provider,
                message: err.to_string(),
            }
        }
    }

    /// Build an upstream error from a non-2xx status and its body
    pub fn upstream(provider: ProviderId, status: u16, body: &str) -> Self {
        ProviderError::Upstream {
            provider,
            status,
            snippet: truncate_snippet(&extract_error_message(body)),
        }
    }
}

/// Truncate to at most `MAX_ERROR_SNIPPET_BYTES`, respecting char boundaries
pub fn truncate_snippet(text: &str) -> String {
    if text.len() <= MAX_ERROR_SNIPPET_BYTES {
        return text.to_string();
    }
    let mut end = MAX_ERROR_SNIPPET_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Pull `error.message` (or a top level `message`) out of a JSON error body,
/// falling back to the raw text
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    body.trim().to_string()
}

static LAST_COMPLETION_NANOS: AtomicU64 = AtomicU64::new(0);

/// Generate a `<provider>-<monotonic nanos>` completion id
///
/// Values are strictly increasing within the process even when the wall
/// clock stalls or steps backwards.
pub fn generate_completion_id(provider: ProviderId) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let mut last = LAST_COMPLETION_NANOS.load(Ordering::Relaxed);
    let value = loop {
        let candidate = now.max(last + 1);
        match LAST_COMPLETION_NANOS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };
    format!("{provider}-{value}")
}

/// Current time in unix seconds
pub fn current_unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
