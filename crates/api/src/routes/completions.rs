use crate::{models::ErrorResponse, routes::common::gateway_error_response, routes::AppState};
use axum::{
    body::{Body, Bytes},
    extract::{Extension, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use inference_providers::ChatCompletionRequest;
use services::{Caller, GatewayError};
use tracing::{debug, info};

/// Header carrying the `<provider>-<monotonic>` correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create chat completion
///
/// Routes the request to the provider that serves `model`. With
/// `stream: true` the upstream SSE bytes are relayed unchanged.
#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    tag = "Chat",
    request_body = crate::models::ChatCompletionRequest,
    responses(
        (status = 200, description = "Completion, or an SSE stream when `stream` is true", body = crate::models::ChatCompletionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 404, description = "Unknown model", body = ErrorResponse),
        (status = 501, description = "Provider cannot stream", body = ErrorResponse),
        (status = 502, description = "Upstream failure or missing credential", body = ErrorResponse),
        (status = 504, description = "Upstream timeout", body = ErrorResponse)
    ),
    security(
        ("api_key" = [])
    )
)]
pub async fn chat_completions(
    State(app_state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let request: ChatCompletionRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejected unparseable chat completion body");
        gateway_error_response(&GatewayError::InvalidRequest(format!(
            "request body is not a valid chat completion request: {e}"
        )))
    })?;

    debug!(
        caller_id = %caller.caller_id,
        model_id = %request.model,
        stream = request.is_stream(),
        "Chat completion request"
    );

    if request.is_stream() {
        let routed = app_state
            .router
            .chat_completion_stream(&caller, request)
            .await
            .map_err(|e| log_and_convert(&caller, e))?;

        info!(
            request_id = %routed.request_id,
            provider = %routed.provider,
            "Streaming chat completion"
        );

        let request_id = routed.request_id.clone();
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from_stream(routed.stream))
            .map_err(|e| {
                gateway_error_response(&GatewayError::UpstreamUnavailable {
                    provider: routed.provider,
                    message: format!("failed to build stream response: {e}"),
                })
            })?;
        insert_request_id(&mut response, &request_id);
        Ok(response)
    } else {
        let routed = app_state
            .router
            .chat_completion(&caller, request)
            .await
            .map_err(|e| log_and_convert(&caller, e))?;

        info!(
            request_id = %routed.request_id,
            provider = %routed.provider,
            model_id = %routed.response.model,
            "Chat completion served"
        );

        let mut response = (StatusCode::OK, Json(routed.response)).into_response();
        insert_request_id(&mut response, &routed.request_id);
        Ok(response)
    }
}

fn insert_request_id(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

fn log_and_convert(caller: &Caller, error: GatewayError) -> (StatusCode, Json<ErrorResponse>) {
    info!(
        caller_id = %caller.caller_id,
        code = error.code(),
        error = %error,
        "Chat completion failed"
    );
    gateway_error_response(&error)
}
