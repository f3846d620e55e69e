//! Shared `reqwest::Client` construction, including the narrow, named TLS
//! bypass for the ChatGPT backend host.

use std::time::Duration;

use relaygate_common::{ProviderId, TransportError, TransportErrorKind, UpstreamError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a client with strict TLS verification — the default for every
/// upstream host except the one named policy below.
pub fn strict_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .expect("reqwest client builds with static config")
}

/// Builds a client with TLS verification disabled, scoped to hosts that
/// genuinely need it. Never reuse this client for a different host.
pub fn tls_bypass_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .danger_accept_invalid_certs(true)
        .build()
        .expect("reqwest client builds with static config")
}

/// Classifies a `reqwest::Error` with no HTTP response into the dispatch
/// engine's transport-error taxonomy.
pub fn classify_transport_error(err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError {
        kind,
        message: err.to_string(),
    }
}

/// Converts any non-2xx `reqwest::Response` into the structured upstream
/// error carrier adapters are required to raise. Consumes the
/// response body, so callers should check `status().is_success()` first.
pub async fn response_to_upstream_error(provider: ProviderId, response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await.unwrap_or_default();
    let mut err = UpstreamError::new(provider, status, body);
    if let Some(retry_after) = retry_after {
        err = err.with_retry_after(retry_after);
    }
    err
}
