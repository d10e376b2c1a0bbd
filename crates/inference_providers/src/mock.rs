//! Mock implementation of ProviderClient for testing
//!
//! The mock records every call it receives, answers with a configurable
//! template and can be told to fail a number of times before succeeding.

use crate::{
    current_unix_timestamp, ByteStream, ChatChoice, ChatCompletionRequest, ChatCompletionResponse,
    ChatResponseMessage, ModelInfo, ProviderClient, ProviderError, ProviderId, Usage,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::Mutex;

/// Template for generating responses
#[derive(Clone)]
pub struct ResponseTemplate {
    content: String,
    /// SSE payloads emitted by streamed completions, before `[DONE]`
    stream_frames: Vec<String>,
}

impl ResponseTemplate {
    /// Create a new response template with the given content
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let stream_frames = content
            .split(' ')
            .map(|word| {
                serde_json::json!({
                    "object": "chat.completion.chunk",
                    "choices": [{"index": 0, "delta": {"content": word}}]
                })
                .to_string()
            })
            .collect();
        Self {
            content,
            stream_frames,
        }
    }

    /// Replace the streamed frames with explicit payloads
    pub fn with_stream_frames(mut self, frames: Vec<String>) -> Self {
        self.stream_frames = frames;
        self
    }

    fn generate_response(&self, id: String, model: String) -> ChatCompletionResponse {
        let output_tokens = self.content.split_whitespace().count() as i64;
        ChatCompletionResponse {
            id,
            object: "chat.completion".to_string(),
            created: current_unix_timestamp(),
            model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatResponseMessage {
                    role: "assistant".to_string(),
                    content: Some(self.content.clone()),
                    extra: HashMap::new(),
                },
                finish_reason: Some("stop".to_string()),
                extra: HashMap::new(),
            }],
            usage: Some(Usage {
                prompt_tokens: 1,
                completion_tokens: output_tokens,
                total_tokens: 1 + output_tokens,
                extra: HashMap::new(),
            }),
            extra: HashMap::new(),
        }
    }

    fn generate_sse(&self) -> Vec<Bytes> {
        self.stream_frames
            .iter()
            .map(|frame| Bytes::from(format!("data: {frame}\n\n")))
            .chain(std::iter::once(Bytes::from_static(b"data: [DONE]\n\n")))
            .collect()
    }
}

/// A call received by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: Option<String>,
    pub request: Option<ChatCompletionRequest>,
}

/// Mock provider that implements ProviderClient for testing
pub struct MockProvider {
    provider: ProviderId,
    requires_credential: bool,
    models: Mutex<Result<Vec<ModelInfo>, ProviderError>>,
    response: Mutex<ResponseTemplate>,
    /// Errors handed out, in order, before calls start succeeding
    failures: Mutex<VecDeque<ProviderError>>,
    calls: Mutex<Vec<RecordedCall>>,
    counter: AtomicU64,
}

impl MockProvider {
    /// Create a mock for `provider` publishing the given model ids
    pub fn new(provider: ProviderId, model_ids: &[&str]) -> Self {
        Self {
            provider,
            requires_credential: provider != ProviderId::Jan,
            models: Mutex::new(Ok(model_ids
                .iter()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    object: "model".to_string(),
                    created: 1762544256,
                    owned_by: provider.to_string(),
                })
                .collect())),
            response: Mutex::new(ResponseTemplate::new("1. 2. 3.")),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Set the response for subsequent completions
    pub async fn respond_with(&self, template: ResponseTemplate) {
        *self.response.lock().await = template;
    }

    /// Fail the next completion calls with these errors, in order
    pub async fn fail_next(&self, errors: Vec<ProviderError>) {
        self.failures.lock().await.extend(errors);
    }

    /// Replace the published model list
    pub async fn set_models(&self, model_ids: &[&str]) {
        *self.models.lock().await = Ok(model_ids
            .iter()
            .map(|id| ModelInfo {
                id: id.to_string(),
                object: "model".to_string(),
                created: 1762544256,
                owned_by: self.provider.to_string(),
            })
            .collect());
    }

    /// Make model listing fail until `set_models` is called again
    pub async fn fail_models(&self, error: ProviderError) {
        *self.models.lock().await = Err(error);
    }

    /// Completion calls received so far
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, api_key: Option<&str>, request: Option<&ChatCompletionRequest>) {
        self.calls.lock().await.push(RecordedCall {
            api_key: api_key.map(str::to_string),
            request: request.cloned(),
        });
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("mock-{}-{n}", self.provider)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn requires_credential(&self) -> bool {
        self.requires_credential
    }

    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        self.record(Some(api_key), Some(&request)).await;
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        let template = self.response.lock().await.clone();
        Ok(template.generate_response(self.next_id(), request.model))
    }

    async fn create_chat_completion_stream(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ByteStream, ProviderError> {
        self.record(Some(api_key), Some(&request)).await;
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        let chunks = self.response.lock().await.generate_sse();
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn get_models(&self, _api_key: Option<&str>) -> Result<Vec<ModelInfo>, ProviderError> {
        self.models.lock().await.clone()
    }
}
