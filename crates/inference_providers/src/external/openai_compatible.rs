//! OpenAI-compatible provider client
//!
//! Serves the upstreams that already speak OpenAI's chat-completion format:
//! - Jan inference (`{JAN_INFERENCE_MODEL_URL}/v1/...`)
//! - OpenRouter (`https://openrouter.ai/api/v1/...`)
//!
//! Requests are forwarded as-is apart from the model rewrite done by the
//! router, and streamed responses are returned as raw body bytes.

use super::{build_http_client, ensure_success};
use crate::{
    stream::IdleTimeoutStream, ByteStream, ChatCompletionRequest, ChatCompletionResponse,
    ClientTimeouts, ModelInfo, ModelsResponse, ProviderClient, ProviderError, ProviderId,
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
};

/// Pass-through client for OpenAI-compatible upstreams
pub struct OpenAiCompatibleClient {
    provider: ProviderId,
    client: Client,
    base_url: String,
    chat_path: &'static str,
    models_path: &'static str,
    credential_required: bool,
    timeouts: ClientTimeouts,
}

impl OpenAiCompatibleClient {
    /// Jan inference exposes `/v1/...` under its base URL and accepts
    /// unauthenticated calls
    pub fn jan(base_url: impl Into<String>, timeouts: ClientTimeouts) -> Result<Self, reqwest::Error> {
        Ok(Self {
            provider: ProviderId::Jan,
            client: build_http_client()?,
            base_url: base_url.into(),
            chat_path: "/v1/chat/completions",
            models_path: "/v1/models",
            credential_required: false,
            timeouts,
        })
    }

    /// OpenRouter's base URL already ends in `/api/v1`
    pub fn openrouter(
        base_url: impl Into<String>,
        timeouts: ClientTimeouts,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            provider: ProviderId::OpenRouter,
            client: build_http_client()?,
            base_url: base_url.into(),
            chat_path: "/chat/completions",
            models_path: "/models",
            credential_required: true,
            timeouts,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }

    fn models_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.models_path)
    }

    fn build_headers(&self, api_key: Option<&str>, stream: bool) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        // Jan runs without auth when no key is configured
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ProviderError::InvalidCredential {
                    provider: self.provider,
                    message: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn requires_credential(&self) -> bool {
        self.credential_required
    }

    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let mut request = request;
        request.stream = Some(false);

        let headers = self.build_headers(Some(api_key), false)?;
        let response = self
            .client
            .post(self.chat_url())
            .headers(headers)
            .timeout(self.timeouts.request)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e, "completion response"))?;

        let response = ensure_success(self.provider, response, self.timeouts.request).await?;

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e, "completion body"))?;

        serde_json::from_slice(&raw_bytes).map_err(|e| ProviderError::InvalidResponse {
            provider: self.provider,
            message: format!("failed to parse completion: {e}"),
        })
    }

    async fn create_chat_completion_stream(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ByteStream, ProviderError> {
        let mut request = request;
        request.stream = Some(true);

        let headers = self.build_headers(Some(api_key), true)?;

        // No whole-request timeout here: it would cut long streams short.
        let pending = self
            .client
            .post(self.chat_url())
            .headers(headers)
            .json(&request)
            .send();

        let response = tokio::time::timeout(self.timeouts.stream_header, pending)
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: self.provider,
                during: "stream response headers",
            })?
            .map_err(|e| ProviderError::from_reqwest(self.provider, e, "stream response headers"))?;

        let response =
            ensure_success(self.provider, response, self.timeouts.stream_header).await?;

        tracing::debug!(
            provider = %self.provider,
            model = %request.model,
            "Upstream stream established"
        );

        Ok(Box::pin(IdleTimeoutStream::new(
            response.bytes_stream(),
            self.provider,
            self.timeouts.stream_idle,
        )))
    }

    async fn get_models(&self, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ProviderError> {
        let headers = self.build_headers(api_key, false)?;
        let response = self
            .client
            .get(self.models_url())
            .headers(headers)
            .timeout(self.timeouts.request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e, "model list"))?;

        let response = ensure_success(self.provider, response, self.timeouts.request).await?;

        let models: ModelsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: self.provider,
                    message: format!("failed to parse model list: {}", e.without_url()),
                })?;

        Ok(models.data)
    }
}
