use crate::models::*;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LLM Gateway API",
        description = "OpenAI-compatible gateway in front of Jan, OpenRouter and Gemini.\n\n## Authentication\n\nSend a gateway API key as `Authorization: Bearer sk-<key>`.",
        version = "1.0.0",
    ),
    paths(
        crate::routes::completions::chat_completions,
        crate::routes::models::list_models,
        crate::routes::models::list_providers,
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            ChatCompletionRequest, ChatCompletionResponse, Message, ChatChoice, Usage,
            ModelListResponse, ModelObject, ProviderListResponse, ProviderSummaryResponse,
            HealthResponse, ErrorResponse, ErrorDetail,
        ),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security configuration for OpenAPI
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("sk-...")
                        .build(),
                ),
            );
        }
    }
}
