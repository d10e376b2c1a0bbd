use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::{completions::ProviderSummary, model_registry::ModelEntry};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn with_code(message: String, error_type: String, code: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                param: None,
                code: Some(code),
            },
        }
    }
}

/// A model in the OpenAI `/v1/models` listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
    /// Provider serving this model
    pub provider: String,
}

impl From<ModelEntry> for ModelObject {
    fn from(entry: ModelEntry) -> Self {
        Self {
            id: entry.id,
            object: "model".to_string(),
            created: entry.created,
            owned_by: entry.owned_by,
            provider: entry.provider.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelListResponse {
    pub object: String,
    pub data: Vec<ModelObject>,
}

/// Status of one upstream provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderSummaryResponse {
    pub provider: String,
    pub name: String,
    pub active: bool,
    pub model_count: usize,
    pub last_error: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    /// Masked process-level API key, if one is configured
    pub api_key_hint: Option<String>,
}

impl From<ProviderSummary> for ProviderSummaryResponse {
    fn from(summary: ProviderSummary) -> Self {
        Self {
            provider: summary.provider.to_string(),
            name: summary.name.to_string(),
            active: summary.active,
            model_count: summary.model_count,
            last_error: summary.last_error,
            checked_at: summary.checked_at,
            api_key_hint: summary.api_key_hint,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderListResponse {
    pub object: String,
    pub data: Vec<ProviderSummaryResponse>,
}

// OpenAPI shapes for the proxied chat completion payloads. Handlers work on
// the provider crate's types, which keep unknown fields for pass-through.

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// `system`, `user`, `assistant` or `tool`
    pub role: String,
    #[schema(value_type = Object)]
    pub content: Option<serde_json::Value>,
}

/// OpenAI chat completion request; extra fields are forwarded unchanged
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<i64>,
    #[schema(value_type = Object)]
    pub stop: Option<serde_json::Value>,
    /// When true the response is an SSE stream ending with `data: [DONE]`
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatChoice {
    pub index: i64,
    pub message: Message,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    /// Public model id, as requested
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
