use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inference_providers::{ChatCompletionRequest, ChatCompletionResponse, ProviderError, ProviderId};
use serde::Serialize;

use super::stream::ProxyStream;
use crate::{
    auth::{AuthError, Caller},
    model_registry::ModelEntry,
};

/// Gateway error taxonomy
///
/// Every variant has a stable [`code`](GatewayError::code) that clients can
/// match on; the HTTP layer maps variants to status codes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("The model '{0}' does not exist")]
    ModelNotFound(String),

    #[error("No credential available for provider {0}")]
    NoCredential(ProviderId),

    #[error("{provider} returned HTTP {status}: {message}")]
    UpstreamError {
        provider: ProviderId,
        status: u16,
        message: String,
    },

    #[error("{provider} is unavailable: {message}")]
    UpstreamUnavailable { provider: ProviderId, message: String },

    #[error("{0}")]
    Timeout(String),

    #[error("{provider} does not support {capability}")]
    UnsupportedCapability {
        provider: ProviderId,
        capability: &'static str,
    },

    #[error("Request canceled")]
    Canceled,
}

impl GatewayError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "InvalidRequest",
            GatewayError::Unauthenticated(_) => "Unauthenticated",
            GatewayError::ModelNotFound(_) => "ModelNotFound",
            GatewayError::NoCredential(_) => "NoCredential",
            GatewayError::UpstreamError { .. } => "UpstreamError",
            GatewayError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            GatewayError::Timeout(_) => "Timeout",
            GatewayError::UnsupportedCapability { .. } => "UnsupportedCapability",
            GatewayError::Canceled => "Canceled",
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream {
                provider,
                status,
                snippet,
            } => GatewayError::UpstreamError {
                provider,
                status,
                message: snippet,
            },
            ProviderError::Unavailable { provider, message } => {
                GatewayError::UpstreamUnavailable { provider, message }
            }
            e @ ProviderError::Timeout { .. } => GatewayError::Timeout(e.to_string()),
            ProviderError::UnsupportedCapability {
                provider,
                capability,
            } => GatewayError::UnsupportedCapability {
                provider,
                capability,
            },
            // A 2xx the gateway cannot read is reported like an upstream 5xx
            e @ ProviderError::InvalidResponse { provider, .. } => GatewayError::UpstreamError {
                provider,
                status: 502,
                message: e.to_string(),
            },
            ProviderError::InvalidCredential { provider, .. } => GatewayError::NoCredential(provider),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        GatewayError::Unauthenticated(err.to_string())
    }
}

/// A buffered completion and where it was served from
#[derive(Debug, Clone)]
pub struct RoutedCompletion {
    /// `<provider>-<monotonic>` correlation id
    pub request_id: String,
    pub provider: ProviderId,
    pub response: ChatCompletionResponse,
}

/// A streamed completion and where it is served from
pub struct RoutedStream {
    pub request_id: String,
    pub provider: ProviderId,
    pub stream: ProxyStream,
}

/// Per-provider status for the providers endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub provider: ProviderId,
    pub name: &'static str,
    pub active: bool,
    pub model_count: usize,
    pub last_error: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub api_key_hint: Option<String>,
}

/// The dispatch facade used by the HTTP handlers
#[async_trait]
pub trait InferenceRouter: Send + Sync {
    async fn chat_completion(
        &self,
        caller: &Caller,
        request: ChatCompletionRequest,
    ) -> Result<RoutedCompletion, GatewayError>;

    async fn chat_completion_stream(
        &self,
        caller: &Caller,
        request: ChatCompletionRequest,
    ) -> Result<RoutedStream, GatewayError>;

    async fn models(&self, caller: &Caller) -> Result<Vec<ModelEntry>, GatewayError>;

    async fn provider_summaries(&self) -> Vec<ProviderSummary>;
}
