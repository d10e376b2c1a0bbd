pub mod ports;
pub mod stream;

use async_trait::async_trait;
use inference_providers::{
    generate_completion_id, ChatCompletionRequest, ProviderClient, ProviderError, ProviderId,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    auth::Caller,
    common::secret_hint,
    credentials::{CredentialError, ProviderCredential},
    model_registry::{ModelEntry, ModelRegistry, ProviderBinding},
};
pub use ports::{GatewayError, InferenceRouter, ProviderSummary, RoutedCompletion, RoutedStream};
pub use stream::ProxyStream;

/// Pause before the single retry of a connect error or upstream 5xx
pub const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Routes OpenAI-style requests to the provider that owns the model
pub struct MultiProviderInference {
    registry: Arc<ModelRegistry>,
    retry_backoff: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl MultiProviderInference {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry,
            retry_backoff: RETRY_BACKOFF,
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Stop the registry refresh task and cancel in-flight calls
    ///
    /// Buffered calls fail with `Canceled`; open streams end.
    pub async fn shutdown(&self) {
        info!("Shutting down inference router");
        self.shutdown_tx.send_replace(true);
        self.registry.shutdown().await;
    }

    fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }

    fn validate(request: &ChatCompletionRequest) -> Result<(), GatewayError> {
        if request.model.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("model is required".to_string()));
        }
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "messages must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate, resolve the model and pick the credential for it
    async fn prepare(
        &self,
        caller: &Caller,
        request: &ChatCompletionRequest,
    ) -> Result<(ProviderBinding, Arc<dyn ProviderClient>, ProviderCredential), GatewayError> {
        Self::validate(request)?;

        let binding = self
            .registry
            .resolve(&request.model)
            .ok_or_else(|| GatewayError::ModelNotFound(request.model.clone()))?;

        let client = self.registry.client(binding.provider).ok_or_else(|| {
            GatewayError::UpstreamUnavailable {
                provider: binding.provider,
                message: "provider is not configured".to_string(),
            }
        })?;

        let credential = match self
            .registry
            .credentials()
            .resolve(caller, binding.provider)
            .await
        {
            Ok(credential) => credential,
            Err(CredentialError::NotFound(_)) if !client.requires_credential() => {
                ProviderCredential::none()
            }
            Err(e) => {
                warn!(
                    caller_id = %caller.caller_id,
                    provider = %binding.provider,
                    error = %e,
                    "No credential for provider"
                );
                return Err(GatewayError::NoCredential(binding.provider));
            }
        };

        Ok((binding, client, credential))
    }

    /// Run `call`, retrying once after the backoff on retriable failures,
    /// and give up with `Canceled` if the router shuts down meanwhile
    async fn call_with_retry<T, F, Fut>(
        &self,
        provider: ProviderId,
        request_id: &str,
        call: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = async {
            match call().await {
                Err(e) if e.is_retriable() => {
                    warn!(
                        request_id = %request_id,
                        provider = %provider,
                        error = %e,
                        "Retriable upstream failure, retrying once"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                    call().await
                }
                other => other,
            }
        };

        tokio::select! {
            result = attempts => result.map_err(GatewayError::from),
            _ = self.shutdown_signal() => {
                info!(request_id = %request_id, provider = %provider, "Upstream call canceled by shutdown");
                Err(GatewayError::Canceled)
            }
        }
    }

    #[cfg(test)]
    fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[async_trait]
impl InferenceRouter for MultiProviderInference {
    async fn chat_completion(
        &self,
        caller: &Caller,
        request: ChatCompletionRequest,
    ) -> Result<RoutedCompletion, GatewayError> {
        let (binding, client, credential) = self.prepare(caller, &request).await?;
        let request_id = generate_completion_id(binding.provider);

        info!(
            request_id = %request_id,
            caller_id = %caller.caller_id,
            provider = %binding.provider,
            model_id = %binding.public_id,
            upstream_id = %binding.upstream_id,
            "Routing chat completion"
        );

        let mut upstream_request = request;
        upstream_request.model = binding.upstream_id.clone();

        let mut response = self
            .call_with_retry(binding.provider, &request_id, || {
                client.create_chat_completion(credential.expose(), upstream_request.clone())
            })
            .await?;

        response.model = binding.public_id;

        Ok(RoutedCompletion {
            request_id,
            provider: binding.provider,
            response,
        })
    }

    async fn chat_completion_stream(
        &self,
        caller: &Caller,
        request: ChatCompletionRequest,
    ) -> Result<RoutedStream, GatewayError> {
        let (binding, client, credential) = self.prepare(caller, &request).await?;
        let request_id = generate_completion_id(binding.provider);

        info!(
            request_id = %request_id,
            caller_id = %caller.caller_id,
            provider = %binding.provider,
            model_id = %binding.public_id,
            upstream_id = %binding.upstream_id,
            "Routing streamed chat completion"
        );

        let mut upstream_request = request;
        upstream_request.model = binding.upstream_id.clone();
        upstream_request.stream = Some(true);

        let upstream = self
            .call_with_retry(binding.provider, &request_id, || {
                client.create_chat_completion_stream(credential.expose(), upstream_request.clone())
            })
            .await?;

        Ok(RoutedStream {
            request_id: request_id.clone(),
            provider: binding.provider,
            stream: ProxyStream::new(
                upstream,
                binding.provider,
                request_id,
                self.shutdown_signal(),
            ),
        })
    }

    async fn models(&self, caller: &Caller) -> Result<Vec<ModelEntry>, GatewayError> {
        let models = self.registry.list();
        debug!(caller_id = %caller.caller_id, models = models.len(), "Listing models");
        Ok(models)
    }

    async fn provider_summaries(&self) -> Vec<ProviderSummary> {
        let snapshot = self.registry.snapshot();
        self.registry
            .providers()
            .into_iter()
            .map(|provider| {
                let health = snapshot.health(provider);
                ProviderSummary {
                    provider,
                    name: provider.display_name(),
                    active: health.is_some_and(|h| h.healthy),
                    model_count: health.map(|h| h.model_count).unwrap_or_default(),
                    last_error: health.and_then(|h| h.last_error.clone()),
                    checked_at: health.and_then(|h| h.checked_at),
                    api_key_hint: self
                        .registry
                        .credentials()
                        .process_default(provider)
                        .map(|c| secret_hint(c.expose())),
                }
            })
            .collect()
    }
}
