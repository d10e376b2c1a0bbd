pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::{
    middleware::{auth_middleware_with_api_key, AuthState},
    openapi::ApiDoc,
    routes::{chat_completions, health_check, list_models, list_providers, AppState},
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use config::{GatewayConfig, ProvidersConfig};
use inference_providers::{ClientTimeouts, GeminiClient, OpenAiCompatibleClient, ProviderClient, ProviderId};
use services::{
    auth::ConfigApiKeyValidator,
    credentials::ConfigOrganizationCredentials,
    model_registry::{parse_priority, ModelPin, RegistrySettings},
    AuthService, CredentialResolver, ModelRegistry, MultiProviderInference,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use utoipa::OpenApi;

/// Build the API key authentication service from the gateway file
pub fn init_auth_service(config: &GatewayConfig) -> Result<Arc<AuthService>, String> {
    let validator = ConfigApiKeyValidator::from_config(&config.gateway.api_keys)
        .map_err(|e| format!("invalid api_keys in gateway file: {e}"))?;
    tracing::info!(
        api_keys = config.gateway.api_keys.len(),
        "Loaded gateway API keys"
    );
    Ok(Arc::new(AuthService::new(
        Arc::new(validator),
        config.auth.apikey_secret.clone(),
    )))
}

/// Create one client per configured provider
pub fn init_provider_clients(
    config: &ProvidersConfig,
) -> Result<Vec<Arc<dyn ProviderClient>>, String> {
    let timeouts = ClientTimeouts {
        request: Duration::from_secs(config.timeouts.request_timeout),
        stream_header: Duration::from_secs(config.timeouts.stream_header_timeout),
        stream_idle: Duration::from_secs(config.timeouts.stream_idle_timeout),
    };

    let mut clients: Vec<Arc<dyn ProviderClient>> = Vec::with_capacity(3);
    match &config.jan {
        Some(jan) => {
            let client = OpenAiCompatibleClient::jan(jan.base_url.clone(), timeouts)
                .map_err(|e| format!("failed to create jan client: {e}"))?;
            clients.push(Arc::new(client));
        }
        None => tracing::info!("JAN_INFERENCE_MODEL_URL not set, jan provider disabled"),
    }

    let openrouter = OpenAiCompatibleClient::openrouter(config.openrouter.base_url.clone(), timeouts)
        .map_err(|e| format!("failed to create openrouter client: {e}"))?;
    clients.push(Arc::new(openrouter));

    let gemini = GeminiClient::new(config.gemini.base_url.clone(), timeouts)
        .map_err(|e| format!("failed to create gemini client: {e}"))?;
    clients.push(Arc::new(gemini));

    Ok(clients)
}

/// Process-level default credentials keyed by provider
pub fn process_default_keys(config: &ProvidersConfig) -> HashMap<ProviderId, String> {
    let mut keys = HashMap::new();
    if let Some(key) = config.jan.as_ref().and_then(|jan| jan.api_key.clone()) {
        keys.insert(ProviderId::Jan, key);
    }
    if let Some(key) = config.openrouter.api_key.clone() {
        keys.insert(ProviderId::OpenRouter, key);
    }
    if let Some(key) = config.gemini.api_key.clone() {
        keys.insert(ProviderId::Gemini, key);
    }
    keys
}

/// Build the model registry, run the boot refresh and start the periodic one
pub async fn init_inference(
    config: &GatewayConfig,
    clients: Vec<Arc<dyn ProviderClient>>,
) -> Result<Arc<MultiProviderInference>, String> {
    let organizations = ConfigOrganizationCredentials::from_config(&config.gateway.organizations)
        .map_err(|e| format!("invalid organizations in gateway file: {e}"))?;
    let credentials = Arc::new(CredentialResolver::new(
        Arc::new(organizations),
        process_default_keys(&config.providers),
    ));

    let pins = config
        .gateway
        .model_pins
        .iter()
        .map(ModelPin::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    let settings = RegistrySettings {
        provider_timeout: Duration::from_secs(config.registry.provider_timeout),
        priority: parse_priority(&config.registry.priority)?,
        pins,
    };

    let registry = Arc::new(ModelRegistry::new(clients, credentials, settings));

    // Boot refresh; a failure here still leaves the gateway serving
    if let Err(e) = registry.refresh().await {
        tracing::warn!("Failed to load models during startup: {}", e);
        tracing::info!("Models will be loaded on the next refresh");
    }
    tracing::info!(models = registry.snapshot().len(), "Model registry initialized");

    if config.registry.refresh_interval > 0 {
        registry
            .clone()
            .start_refresh_task(Duration::from_secs(config.registry.refresh_interval))
            .await;
    }

    Ok(Arc::new(MultiProviderInference::new(registry)))
}

/// Build the complete application router
pub fn build_app(app_state: AppState, auth_state: AuthState) -> Router {
    Router::new()
        .route("/v1/health", get(health_check))
        .nest("/v1", build_completion_routes(app_state, &auth_state))
        .merge(build_openapi_routes())
}

/// Build the authenticated gateway routes
pub fn build_completion_routes(app_state: AppState, auth_state: &AuthState) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/models", get(list_models))
        .route("/models/providers", get(list_providers))
        .with_state(app_state)
        .layer(from_fn_with_state(
            auth_state.clone(),
            auth_middleware_with_api_key,
        ))
}

/// Build OpenAPI documentation routes
pub fn build_openapi_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}
