//! Inference providers crate for the upstream LLM services behind the gateway
//!
//! Every upstream is exposed through the small [`ProviderClient`] capability
//! trait: buffered completion, streamed completion and model listing. Jan and
//! OpenRouter speak the OpenAI wire format and are proxied as-is; Gemini is
//! translated to and from its `generateContent` shape.
//!
//! # Streaming
//!
//! Streamed completions are returned as a [`ByteStream`] of raw upstream bytes.
//! Nothing is parsed or re-framed here. Dropping the stream drops the
//! underlying HTTP response, which closes the upstream connection.
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use inference_providers::{ChatCompletionRequest, ChatMessage, ProviderClient};
//!
//! async fn example(client: &dyn ProviderClient) {
//!     let request = ChatCompletionRequest::new("jan-v1", vec![ChatMessage::new("user", "hi")]);
//!     let mut stream = client.create_chat_completion_stream("sk-...", request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", String::from_utf8_lossy(&chunk?));
//!     }
//! }
//! ```

pub mod external;
pub mod mock;
pub mod models;
pub mod stream;

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

// Re-export commonly used types for convenience
pub use external::{gemini::GeminiClient, openai_compatible::OpenAiCompatibleClient};
pub use mock::MockProvider;
pub use models::{
    current_unix_timestamp, generate_completion_id, ChatChoice, ChatCompletionRequest,
    ChatCompletionResponse, ChatMessage, ChatResponseMessage, ModelInfo, ModelsResponse,
    ProviderError, ProviderId, StopSequences, Usage,
};
pub use stream::IdleTimeoutStream;

/// Raw upstream bytes of a streamed completion
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// Timeouts applied to upstream calls
#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    /// Whole-request timeout for buffered completions and model listing
    pub request: Duration,
    /// Time allowed for a stream to return response headers
    pub stream_header: Duration,
    /// Longest allowed gap between two stream chunks
    pub stream_idle: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            stream_header: Duration::from_secs(30),
            stream_idle: Duration::from_secs(60),
        }
    }
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Which upstream this client talks to
    fn provider(&self) -> ProviderId;

    /// Whether calls without an API key should be refused before reaching
    /// the upstream
    fn requires_credential(&self) -> bool {
        true
    }

    /// Performs a buffered chat completion
    ///
    /// `request.model` must already be the upstream model id.
    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError>;

    /// Performs a streamed chat completion
    ///
    /// Returns once the upstream has answered with a 2xx status. The stream
    /// yields the response body bytes as they arrive.
    async fn create_chat_completion_stream(
        &self,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> Result<ByteStream, ProviderError>;

    /// Lists the models this upstream publishes
    ///
    /// An empty list is a valid answer and not a failure.
    async fn get_models(&self, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ProviderError>;
}
