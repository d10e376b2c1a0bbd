use crate::{models::ErrorResponse, routes::common::gateway_error_response};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use services::{AuthService, GatewayError};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(auth_service: Arc<AuthService>) -> Self {
        Self { auth_service }
    }
}

/// Authenticates `Authorization: Bearer sk-...` and attaches the resolved
/// [`services::Caller`] to the request extensions
pub async fn auth_middleware_with_api_key(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(auth_value) => match bearer_token(auth_value) {
            Some(token) => token,
            None => {
                debug!("Authorization header does not use the Bearer scheme");
                return Err(unauthenticated("Invalid authorization header format"));
            }
        },
        None => return Err(unauthenticated("Missing authorization header")),
    };

    match state.auth_service.authenticate(token).await {
        Ok(caller) => {
            debug!(caller_id = %caller.caller_id, "Authenticated caller");
            let mut request = request;
            request.extensions_mut().insert(caller);
            Ok(next.run(request).await)
        }
        Err(e) => Err(gateway_error_response(&GatewayError::from(e))),
    }
}

/// Token of a `Bearer <token>` header value; the scheme name is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

fn unauthenticated(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    gateway_error_response(&GatewayError::Unauthenticated(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::Extension,
        http::Request as HttpRequest,
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use services::{
        auth::ports::{ApiKeyRecord, AuthError, MockApiKeyValidator},
        common::hash_api_key,
        Caller,
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-secret";

    async fn whoami(Extension(caller): Extension<Caller>) -> String {
        caller.caller_id
    }

    fn app(validator: MockApiKeyValidator) -> Router {
        let state = AuthState::new(Arc::new(AuthService::new(Arc::new(validator), SECRET)));
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state, auth_middleware_with_api_key))
    }

    fn request(authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_known_key_reaches_handler() {
        let expected = hash_api_key(SECRET, "sk-good");
        let mut validator = MockApiKeyValidator::new();
        validator
            .expect_find_by_hash()
            .withf(move |hash| hash == expected)
            .times(1)
            .returning(|_| {
                Ok(Some(ApiKeyRecord {
                    caller_id: "caller-1".to_string(),
                    organization_id: None,
                    enabled: true,
                    expires_at: None,
                    provider_keys: HashMap::new(),
                }))
            });

        let response = app(validator)
            .oneshot(request(Some("Bearer sk-good")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"caller-1");
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer sk-good"), Some("sk-good"));
        assert_eq!(bearer_token("bearer sk-good"), Some("sk-good"));
        assert_eq!(bearer_token("BEARER  sk-good "), Some("sk-good"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearersk-good"), None);
    }

    #[tokio::test]
    async fn test_lowercase_scheme_reaches_handler() {
        let mut validator = MockApiKeyValidator::new();
        validator.expect_find_by_hash().times(1).returning(|_| {
            Ok(Some(ApiKeyRecord {
                caller_id: "caller-lower".to_string(),
                organization_id: None,
                enabled: true,
                expires_at: None,
                provider_keys: HashMap::new(),
            }))
        });

        let response = app(validator)
            .oneshot(request(Some("bearer sk-good")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"caller-lower");
    }

    #[tokio::test]
    async fn test_rejections_never_reach_validator() {
        for header in [None, Some("Token sk-good"), Some("Bearer "), Some("Bearer no-prefix")] {
            let mut validator = MockApiKeyValidator::new();
            validator.expect_find_by_hash().never();

            let response = app(validator).oneshot(request(header)).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{header:?}");
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["error"]["code"], "Unauthenticated");
        }
    }

    #[tokio::test]
    async fn test_validator_failure_is_unauthenticated() {
        let mut validator = MockApiKeyValidator::new();
        validator
            .expect_find_by_hash()
            .returning(|_| Err(AuthError::Backend("store offline".to_string())));

        let response = app(validator)
            .oneshot(request(Some("Bearer sk-good")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
