use crate::models::ErrorResponse;
use axum::{http::StatusCode, Json};
use services::GatewayError;

/// Status used for requests canceled before an answer was produced
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Map gateway errors to HTTP status codes
pub fn map_gateway_error_to_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        GatewayError::ModelNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::NoCredential(_) => StatusCode::BAD_GATEWAY,
        GatewayError::UpstreamError { status, .. } => match StatusCode::from_u16(*status) {
            Ok(code) if code.is_client_error() => code,
            _ => StatusCode::BAD_GATEWAY,
        },
        GatewayError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::UnsupportedCapability { .. } => StatusCode::NOT_IMPLEMENTED,
        GatewayError::Canceled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT)
        }
    }
}

fn error_type(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::InvalidRequest(_) => "invalid_request_error",
        GatewayError::Unauthenticated(_) => "authentication_error",
        GatewayError::ModelNotFound(_) => "not_found_error",
        GatewayError::NoCredential(_)
        | GatewayError::UpstreamError { .. }
        | GatewayError::UpstreamUnavailable { .. } => "upstream_error",
        GatewayError::Timeout(_) => "timeout_error",
        GatewayError::UnsupportedCapability { .. } => "not_implemented_error",
        GatewayError::Canceled => "canceled",
    }
}

/// Convert a gateway error into the OpenAI-style error envelope
pub fn gateway_error_response(error: &GatewayError) -> (StatusCode, Json<ErrorResponse>) {
    (
        map_gateway_error_to_status(error),
        Json(ErrorResponse::with_code(
            error.to_string(),
            error_type(error).to_string(),
            error.code().to_string(),
        )),
    )
}
