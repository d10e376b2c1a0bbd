#![allow(dead_code)]

use api::{
    build_app, init_auth_service, init_inference, init_provider_clients, middleware::AuthState,
    routes::AppState,
};
use axum_test::TestServer;
use config::{
    ApiKeyConfig, AuthConfig, GatewayConfig, GatewayFile, InferenceTimeoutConfig, LoggingConfig,
    ModelPinConfig, ProviderEndpointConfig, ProvidersConfig, RegistryConfig, ServerConfig,
};
use httpmock::prelude::*;
use serde_json::json;
use services::{common::hash_api_key, MultiProviderInference};
use std::{collections::HashMap, sync::Arc};

pub const TEST_SECRET: &str = "test-apikey-secret";
/// Gateway key of a caller without upstream overrides
pub const TEST_API_KEY: &str = "sk-test-gateway-key";
/// Gateway key whose record carries its own OpenRouter key
pub const OVERRIDE_API_KEY: &str = "sk-test-override-key";
pub const DISABLED_API_KEY: &str = "sk-test-disabled-key";

pub const OPENROUTER_PROCESS_KEY: &str = "sk-or-process";
pub const OPENROUTER_CALLER_KEY: &str = "sk-or-caller";
pub const GEMINI_PROCESS_KEY: &str = "gemini-process-key";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("info,api=debug,services=debug")
        .try_init();
}

pub fn bearer(key: &str) -> String {
    format!("Bearer {key}")
}

fn api_key(key: &str, caller_id: &str) -> ApiKeyConfig {
    ApiKeyConfig {
        key_hash: hash_api_key(TEST_SECRET, key),
        caller_id: caller_id.to_string(),
        organization_id: None,
        enabled: true,
        expires_at: None,
        provider_keys: HashMap::new(),
    }
}

/// Helper function to create a test configuration pointing at mock upstreams
pub fn test_config(jan_url: &str, openrouter_url: &str, gemini_url: &str) -> GatewayConfig {
    let mut override_key = api_key(OVERRIDE_API_KEY, "caller-override");
    override_key
        .provider_keys
        .insert("openrouter".to_string(), OPENROUTER_CALLER_KEY.to_string());

    let mut disabled_key = api_key(DISABLED_API_KEY, "caller-disabled");
    disabled_key.enabled = false;

    GatewayConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        providers: ProvidersConfig {
            jan: Some(ProviderEndpointConfig {
                base_url: jan_url.to_string(),
                api_key: None,
            }),
            openrouter: ProviderEndpointConfig {
                base_url: openrouter_url.to_string(),
                api_key: Some(OPENROUTER_PROCESS_KEY.to_string()),
            },
            gemini: ProviderEndpointConfig {
                base_url: gemini_url.to_string(),
                api_key: Some(GEMINI_PROCESS_KEY.to_string()),
            },
            timeouts: InferenceTimeoutConfig {
                request_timeout: 5,
                stream_header_timeout: 5,
                stream_idle_timeout: 10,
            },
        },
        registry: RegistryConfig {
            // The periodic task stays off; tests refresh explicitly
            refresh_interval: 0,
            provider_timeout: 2,
            priority: vec![
                "jan".to_string(),
                "openrouter".to_string(),
                "gemini".to_string(),
            ],
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "compact".to_string(),
            modules: HashMap::new(),
        },
        auth: AuthConfig {
            apikey_secret: TEST_SECRET.to_string(),
        },
        gateway: GatewayFile {
            api_keys: vec![
                api_key(TEST_API_KEY, "caller-default"),
                override_key,
                disabled_key,
            ],
            organizations: HashMap::new(),
            model_pins: vec![ModelPinConfig {
                model: "fast-llama".to_string(),
                provider: "openrouter".to_string(),
                upstream_id: "meta-llama/llama-3-8b-instruct".to_string(),
            }],
        },
    }
}

/// Mock upstreams for the three providers
pub struct Upstreams {
    pub jan: MockServer,
    pub openrouter: MockServer,
    pub gemini: MockServer,
}

impl Upstreams {
    pub async fn start() -> Self {
        Self {
            jan: MockServer::start_async().await,
            openrouter: MockServer::start_async().await,
            gemini: MockServer::start_async().await,
        }
    }

    pub fn config(&self) -> GatewayConfig {
        test_config(
            &self.jan.base_url(),
            &self.openrouter.base_url(),
            &self.gemini.base_url(),
        )
    }

    /// Default catalogs: jan-v1 on jan, two models on OpenRouter, one Gemini model
    pub async fn mock_default_catalogs(&self) {
        mock_openai_models(&self.jan, "/v1/models", &["jan-v1"]).await;
        mock_openai_models(
            &self.openrouter,
            "/models",
            &["openai/gpt-4o", "meta-llama/llama-3-8b-instruct"],
        )
        .await;
        mock_gemini_models(&self.gemini, &["gemini-1.5-pro"]).await;
    }
}

pub async fn mock_openai_models<'a>(
    server: &'a MockServer,
    path: &str,
    ids: &[&str],
) -> httpmock::Mock<'a> {
    let data: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "object": "model", "created": 1700000000, "owned_by": "upstream"}))
        .collect();
    let path = path.to_string();
    server
        .mock_async(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .json_body(json!({"object": "list", "data": data}));
        })
        .await
}

pub async fn mock_gemini_models<'a>(server: &'a MockServer, ids: &[&str]) -> httpmock::Mock<'a> {
    let models: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "name": format!("models/{id}"),
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            })
        })
        .collect();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/models")
                .query_param("key", GEMINI_PROCESS_KEY);
            then.status(200).json_body(json!({"models": models}));
        })
        .await
}

pub fn chat_body(model: &str, content: &str) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": content}]
    })
}

pub fn openai_completion(model: &str, content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-upstream",
        "object": "chat.completion",
        "created": 1700000000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
    })
}

/// Build the gateway for `config`, running the boot refresh
pub async fn setup_gateway(config: &GatewayConfig) -> (axum::Router, Arc<MultiProviderInference>) {
    init_test_tracing();

    let auth_service = init_auth_service(config).expect("auth service");
    let clients = init_provider_clients(&config.providers).expect("provider clients");
    let router = init_inference(config, clients).await.expect("inference router");

    let app = build_app(AppState::new(router.clone()), AuthState::new(auth_service));
    (app, router)
}

pub async fn setup_test_server(
    config: &GatewayConfig,
) -> (TestServer, Arc<MultiProviderInference>) {
    let (app, router) = setup_gateway(config).await;
    let server = TestServer::new(app).expect("test server");
    (server, router)
}
