use crate::{
    models::{
        ErrorResponse, ModelListResponse, ModelObject, ProviderListResponse,
        ProviderSummaryResponse,
    },
    routes::{common::gateway_error_response, AppState},
};
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use services::Caller;
use tracing::debug;

/// List models
///
/// Returns the merged model catalog of every configured provider. Public
/// ids are unique; on collisions the higher priority provider wins.
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "Models",
    responses(
        (status = 200, description = "Aggregated model list", body = ModelListResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(
        ("api_key" = [])
    )
)]
pub async fn list_models(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ModelListResponse>, (StatusCode, ResponseJson<ErrorResponse>)> {
    let models = app_state
        .router
        .models(&caller)
        .await
        .map_err(|e| gateway_error_response(&e))?;

    debug!(caller_id = %caller.caller_id, count = models.len(), "Listing models");

    Ok(ResponseJson(ModelListResponse {
        object: "list".to_string(),
        data: models.into_iter().map(ModelObject::from).collect(),
    }))
}

/// List providers
///
/// Per-provider status from the last registry refresh.
#[utoipa::path(
    get,
    path = "/v1/models/providers",
    tag = "Models",
    responses(
        (status = 200, description = "Provider summaries", body = ProviderListResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(
        ("api_key" = [])
    )
)]
pub async fn list_providers(State(app_state): State<AppState>) -> ResponseJson<ProviderListResponse> {
    let summaries = app_state.router.provider_summaries().await;

    ResponseJson(ProviderListResponse {
        object: "list".to_string(),
        data: summaries
            .into_iter()
            .map(ProviderSummaryResponse::from)
            .collect(),
    })
}
