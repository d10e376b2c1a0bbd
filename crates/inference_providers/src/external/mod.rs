//! HTTP clients for the upstream providers
//!
//! - [`openai_compatible`]: Jan inference and OpenRouter (pass-through)
//! - [`gemini`]: Google Gemini `generateContent` (translated)
//!
//! Each client owns one pooled `reqwest::Client` that is shared by all
//! concurrent calls to that upstream.

pub mod gemini;
pub mod openai_compatible;

use crate::{ProviderError, ProviderId};
use reqwest::{Client, Response};
use std::time::Duration;

/// Build the pooled HTTP client used for one upstream
///
/// Only the connect phase is bounded here; request, header and idle
/// timeouts are applied per call.
pub(crate) fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

/// Upper bound on how much of a non-2xx body is read before it is summarized
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Turn a non-2xx response into `ProviderError::Upstream` carrying a
/// truncated body snippet
///
/// The error body is read for at most `read_timeout` and at most
/// `MAX_ERROR_BODY_BYTES`; whatever arrived by then becomes the snippet.
pub(crate) async fn ensure_success(
    provider: ProviderId,
    mut response: Response,
    read_timeout: Duration,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = Vec::new();
    let read = async {
        while body.len() < MAX_ERROR_BODY_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(
                        provider = %provider,
                        error = %e.without_url(),
                        "Failed to read upstream error body"
                    );
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(read_timeout, read).await.is_err() {
        tracing::debug!(
            provider = %provider,
            bytes_read = body.len(),
            "Upstream error body stalled"
        );
    }

    tracing::warn!(
        provider = %provider,
        status = status.as_u16(),
        "Upstream returned non-success status"
    );

    Err(ProviderError::upstream(
        provider,
        status.as_u16(),
        &String::from_utf8_lossy(&body),
    ))
}
