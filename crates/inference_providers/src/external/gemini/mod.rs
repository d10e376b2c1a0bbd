//! Gemini client implementation
//!
//! This client handles HTTP communication with Google's Generative Language
//! API. Format conversion is handled by the `converter` module.

pub mod converter;

use super::{build_http_client, ensure_success};
use crate::{
    ByteStream, ChatCompletionRequest, ChatCompletionResponse, ClientTimeouts, ModelInfo,
    ProviderClient, ProviderError, ProviderId,
};
use async_trait::async_trait;
use converter::{build_request, convert_models, convert_response, GeminiModelList, GeminiResponse};
use reqwest::Client;

/// Upper bound on `models.list` pages followed in one listing
const MAX_MODEL_PAGES: usize = 10;

/// Gemini client - the API key travels as the `key` query parameter
pub struct GeminiClient {
    client: Client,
    base_url: String,
    timeouts: ClientTimeouts,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, timeouts: ClientTimeouts) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into(),
            timeouts,
        })
    }

    fn generate_content_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            strip_resource_prefix(model)
        )
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }
}

/// Accept both `gemini-1.5-pro` and `models/gemini-1.5-pro`
fn strip_resource_prefix(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let body = build_request(&request);

        tracing::debug!(
            model = %request.model,
            contents = body.contents.len(),
            system_parts = body.system_instruction.as_ref().map_or(0, |s| s.parts.len()),
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.generate_content_url(&request.model))
            .query(&[("key", api_key)])
            .timeout(self.timeouts.request)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Gemini, e, "completion response"))?;

        let response =
            ensure_success(ProviderId::Gemini, response, self.timeouts.request).await?;

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Gemini, e, "completion body"))?;

        let gemini_response: GeminiResponse =
            serde_json::from_slice(&raw_bytes).map_err(|e| ProviderError::InvalidResponse {
                provider: ProviderId::Gemini,
                message: format!("failed to parse generateContent response: {e}"),
            })?;

        Ok(convert_response(gemini_response, &request.model))
    }

    async fn create_chat_completion_stream(
        &self,
        _api_key: &str,
        _request: ChatCompletionRequest,
    ) -> Result<ByteStream, ProviderError> {
        Err(ProviderError::UnsupportedCapability {
            provider: ProviderId::Gemini,
            capability: "streaming chat completions",
        })
    }

    async fn get_models(&self, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ProviderError> {
        let api_key = api_key.ok_or_else(|| ProviderError::InvalidCredential {
            provider: ProviderId::Gemini,
            message: "model listing needs an API key".to_string(),
        })?;

        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_MODEL_PAGES {
            let mut query = vec![("key", api_key.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .client
                .get(self.models_url())
                .query(&query)
                .timeout(self.timeouts.request)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(ProviderId::Gemini, e, "model list"))?;

            let response =
            ensure_success(ProviderId::Gemini, response, self.timeouts.request).await?;

            let page: GeminiModelList =
                response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse {
                        provider: ProviderId::Gemini,
                        message: format!("failed to parse model list: {}", e.without_url()),
                    })?;

            models.extend(convert_models(page.models));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(models),
            }
        }

        tracing::warn!(
            pages = MAX_MODEL_PAGES,
            models = models.len(),
            "Gemini model listing truncated at page limit"
        );
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_generate_content_url() {
        let client = GeminiClient::new(
            "https://generativelanguage.googleapis.com/v1beta/",
            ClientTimeouts::default(),
        )
        .unwrap();

        assert_eq!(
            client.generate_content_url("gemini-1.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert_eq!(
            client.generate_content_url("models/gemini-1.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_chat_completion_uses_query_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-pro:generateContent")
                .query_param("key", "g-key")
                .json_body(json!({
                    "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
                }));
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "hello from gemini"}]},
                    "finishReason": "STOP"
                }]
            }));
        });

        let client = GeminiClient::new(server.base_url(), ClientTimeouts::default()).unwrap();
        let request =
            ChatCompletionRequest::new("gemini-1.5-pro", vec![ChatMessage::new("user", "hi")]);

        let response = client.create_chat_completion("g-key", request).await.unwrap();

        mock.assert();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("hello from gemini")
        );
        assert_eq!(response.model, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn test_streaming_is_unsupported() {
        let client = GeminiClient::new("http://localhost", ClientTimeouts::default()).unwrap();
        let request =
            ChatCompletionRequest::new("gemini-1.5-pro", vec![ChatMessage::new("user", "hi")]);

        let err = match client.create_chat_completion_stream("k", request).await {
            Ok(_) => panic!("expected streaming to be rejected"),
            Err(e) => e,
        };
        assert!(matches!(err, ProviderError::UnsupportedCapability { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_does_not_leak_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-pro:generateContent");
            then.status(400)
                .json_body(json!({"error": {"code": 400, "message": "API key not valid."}}));
        });

        let client = GeminiClient::new(server.base_url(), ClientTimeouts::default()).unwrap();
        let request =
            ChatCompletionRequest::new("gemini-1.5-pro", vec![ChatMessage::new("user", "hi")]);
        let err = client
            .create_chat_completion("secret-key", request)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Upstream { status: 400, .. }));
        assert!(!err.to_string().contains("secret-key"));
    }

    #[tokio::test]
    async fn test_get_models_follows_pages() {
        let server = MockServer::start();
        // Mocks are matched in creation order, so the more specific page
        // request is registered first
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/models")
                .query_param("key", "g-key")
                .query_param("pageToken", "next");
            then.status(200).json_body(json!({
                "models": [{"name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent"]}]
            }));
        });
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/models")
                .query_param("key", "g-key");
            then.status(200).json_body(json!({
                "models": [{"name": "models/gemini-1.5-pro", "supportedGenerationMethods": ["generateContent"]}],
                "nextPageToken": "next"
            }));
        });

        let client = GeminiClient::new(server.base_url(), ClientTimeouts::default()).unwrap();
        let models = client.get_models(Some("g-key")).await.unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gemini-1.5-pro", "gemini-2.0-flash"]);
    }

    #[tokio::test]
    async fn test_get_models_requires_key() {
        let client = GeminiClient::new("http://localhost", ClientTimeouts::default()).unwrap();
        let err = client.get_models(None).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential { .. }));
    }
}
