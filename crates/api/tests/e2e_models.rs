// E2E tests for model listing, provider status and authentication
mod common;

use common::*;
use httpmock::prelude::*;
use serde_json::Value;

fn model_ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect()
}

fn provider_of<'a>(body: &'a Value, id: &str) -> &'a str {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == id)
        .and_then(|m| m["provider"].as_str())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let upstreams = Upstreams::start().await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server.get("/v1/health").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let upstreams = Upstreams::start().await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server.get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let spec = response.json::<Value>();
    assert!(spec["paths"]["/v1/chat/completions"].is_object());
}

#[tokio::test]
async fn test_requests_without_valid_key_are_rejected() {
    let upstreams = Upstreams::start().await;
    upstreams.mock_default_catalogs().await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server.get("/v1/models").await;
    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json::<Value>()["error"]["code"], "Unauthenticated");

    let cases = [
        "Basic dXNlcjpwYXNz".to_string(),
        bearer("not-a-gateway-key"),
        bearer("sk-unknown-key"),
        bearer(DISABLED_API_KEY),
    ];
    for header in cases {
        let response = server
            .get("/v1/models")
            .add_header("Authorization", header.clone())
            .await;
        assert_eq!(response.status_code(), 401, "{header}");
        assert_eq!(response.json::<Value>()["error"]["code"], "Unauthenticated");
    }
}

#[tokio::test]
async fn test_models_are_aggregated_across_providers() {
    let upstreams = Upstreams::start().await;
    upstreams.mock_default_catalogs().await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server
        .get("/v1/models")
        .add_header("Authorization", bearer(TEST_API_KEY))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["object"], "list");

    let mut ids = model_ids(&body);
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "fast-llama",
            "gemini-1.5-pro",
            "jan-v1",
            "meta-llama/llama-3-8b-instruct",
            "openai/gpt-4o",
        ]
    );
    assert_eq!(provider_of(&body, "jan-v1"), "jan");
    assert_eq!(provider_of(&body, "gemini-1.5-pro"), "gemini");
    assert_eq!(provider_of(&body, "fast-llama"), "openrouter");
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["object"] == "model"));
}

#[tokio::test]
async fn test_collision_goes_to_higher_priority_provider() {
    let upstreams = Upstreams::start().await;
    mock_openai_models(&upstreams.jan, "/v1/models", &["shared-model"]).await;
    mock_openai_models(&upstreams.openrouter, "/models", &["shared-model"]).await;
    mock_gemini_models(&upstreams.gemini, &["shared-model"]).await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server
        .get("/v1/models")
        .add_header("Authorization", bearer(TEST_API_KEY))
        .await;

    let body = response.json::<Value>();
    assert_eq!(
        model_ids(&body)
            .iter()
            .filter(|id| *id == "shared-model")
            .count(),
        1
    );
    assert_eq!(provider_of(&body, "shared-model"), "jan");
}

#[tokio::test]
async fn test_failed_gemini_refresh_keeps_models_listed() {
    let upstreams = Upstreams::start().await;
    mock_openai_models(&upstreams.jan, "/v1/models", &["jan-v1"]).await;
    mock_openai_models(&upstreams.openrouter, "/models", &["openai/gpt-4o"]).await;
    let gemini_models = mock_gemini_models(&upstreams.gemini, &["gemini-1.5-pro"]).await;
    let (server, router) = setup_test_server(&upstreams.config()).await;

    // Gemini starts failing before the next refresh
    gemini_models.delete_async().await;
    let failing = upstreams
        .gemini
        .mock_async(|when, then| {
            when.method(GET).path("/models");
            then.status(500).body("backend exploded");
        })
        .await;
    router.registry().refresh().await.unwrap();
    failing.assert_async().await;

    let response = server
        .get("/v1/models")
        .add_header("Authorization", bearer(TEST_API_KEY))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    let ids = model_ids(&body);
    assert!(ids.contains(&"jan-v1".to_string()));
    assert!(ids.contains(&"openai/gpt-4o".to_string()));
    assert!(ids.contains(&"gemini-1.5-pro".to_string()));

    let response = server
        .get("/v1/models/providers")
        .add_header("Authorization", bearer(TEST_API_KEY))
        .await;

    assert_eq!(response.status_code(), 200);
    let providers = response.json::<Value>();
    let gemini = providers["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["provider"] == "gemini")
        .unwrap()
        .clone();
    assert_eq!(gemini["active"], false);
    assert_eq!(gemini["model_count"], 1);
    assert!(gemini["last_error"].as_str().unwrap().contains("500"));

    let jan = providers["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["provider"] == "jan")
        .unwrap()
        .clone();
    assert_eq!(jan["active"], true);
    assert!(jan["api_key_hint"].is_null());
}

#[tokio::test]
async fn test_provider_summary_never_shows_keys() {
    let upstreams = Upstreams::start().await;
    upstreams.mock_default_catalogs().await;
    let (server, _router) = setup_test_server(&upstreams.config()).await;

    let response = server
        .get("/v1/models/providers")
        .add_header("Authorization", bearer(TEST_API_KEY))
        .await;

    let text = response.text();
    assert!(!text.contains(OPENROUTER_PROCESS_KEY));
    assert!(!text.contains(GEMINI_PROCESS_KEY));

    let body: Value = serde_json::from_str(&text).unwrap();
    let openrouter = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["provider"] == "openrouter")
        .unwrap()
        .clone();
    assert_eq!(openrouter["api_key_hint"], "****cess");
    assert_eq!(openrouter["model_count"], 2);
}
