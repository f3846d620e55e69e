//! The dispatch-facing error taxonomy.
//!
//! Three kinds travel through the core: routing, upstream, transport. A
//! fourth, `Http`, is a narrow fallback for non-2xx adapter responses that
//! were never classified into `Upstream` — adapters are expected to always
//! raise `Upstream` instead, so this variant should be rare in practice.

use bytes::Bytes;
use std::fmt;

use crate::provider::ProviderId;

/// Why an account is presently hidden from selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitReason {
    QuotaExhausted,
    RateLimited,
    ServerError,
    Unauthorized,
    Other,
}

impl RateLimitReason {
    /// Default cooldown when the upstream delay can't be parsed.
    pub fn default_cooldown(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            RateLimitReason::QuotaExhausted => Duration::from_secs(10 * 60),
            RateLimitReason::RateLimited => Duration::from_secs(60),
            RateLimitReason::ServerError => Duration::from_secs(10),
            RateLimitReason::Unauthorized => Duration::from_secs(30),
            RateLimitReason::Other => Duration::from_secs(60),
        }
    }
}

/// A structured carrier for any non-2xx upstream HTTP response.
#[derive(Debug, Clone)]
pub struct UpstreamError {
    pub provider: ProviderId,
    pub status: u16,
    pub body: Bytes,
    pub retry_after_header: Option<String>,
}

impl UpstreamError {
    pub fn new(provider: ProviderId, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            provider,
            status,
            body: body.into(),
            retry_after_header: None,
        }
    }

    pub fn with_retry_after(mut self, header: impl Into<String>) -> Self {
        self.retry_after_header = Some(header.into());
        self
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upstream error from {}: status {}",
            self.provider, self.status
        )
    }
}

/// No entry in the resolved routing list could be found or run.
#[derive(Debug, Clone)]
pub struct RoutingError {
    pub model: String,
    pub message: String,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no usable route for model '{}': {}", self.model, self.message)
    }
}

/// Transport-level failure with no HTTP response at all (timeout, DNS, TLS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error ({:?}): {}", self.kind, self.message)
    }
}

/// Fallback wrapper for a raw non-2xx response an adapter didn't map to
/// `UpstreamError`. Adapters should not normally produce this.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: u16,
    pub body: Bytes,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http error: status {}", self.status)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Routing(RoutingError),
    #[error("{0}")]
    Upstream(UpstreamError),
    #[error("{0}")]
    Transport(TransportError),
    #[error("{0}")]
    Http(HttpError),
}

/// Provider-independent log category: used so dashboards/log
/// lines read the same regardless of which upstream's wording produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonClass {
    QuotaExhausted,
    RateLimited,
    Unauthorized,
    Forbidden,
    NotFound,
    UpstreamError,
    HttpError,
    InternalError,
}

impl ReasonClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonClass::QuotaExhausted => "quota exhausted",
            ReasonClass::RateLimited => "rate limited",
            ReasonClass::Unauthorized => "unauthorized",
            ReasonClass::Forbidden => "forbidden",
            ReasonClass::NotFound => "not found",
            ReasonClass::UpstreamError => "upstream error",
            ReasonClass::HttpError => "http error",
            ReasonClass::InternalError => "internal error",
        }
    }
}

impl fmt::Display for ReasonClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DispatchError {
    /// Derive a reason class for logging. `rate_limit_reason`, when
    /// known (computed by the retry evaluator from the error body), refines
    /// a 429 `Upstream` error into quota-exhausted vs plain rate-limited.
    pub fn reason_class(&self, rate_limit_reason: Option<RateLimitReason>) -> ReasonClass {
        match self {
            DispatchError::Routing(_) => ReasonClass::NotFound,
            DispatchError::Transport(_) => ReasonClass::UpstreamError,
            DispatchError::Http(_) => ReasonClass::HttpError,
            DispatchError::Upstream(err) => match err.status {
                401 => ReasonClass::Unauthorized,
                403 => ReasonClass::Forbidden,
                404 => ReasonClass::NotFound,
                429 => match rate_limit_reason {
                    Some(RateLimitReason::QuotaExhausted) => ReasonClass::QuotaExhausted,
                    _ => ReasonClass::RateLimited,
                },
                _ => ReasonClass::UpstreamError,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_upstream_maps_to_unauthorized_reason() {
        let err = DispatchError::Upstream(UpstreamError::new(ProviderId::Codex, 401, "nope"));
        assert_eq!(err.reason_class(None), ReasonClass::Unauthorized);
    }

    #[test]
    fn rate_limit_without_quota_hint_is_rate_limited() {
        let err = DispatchError::Upstream(UpstreamError::new(ProviderId::Antigravity, 429, "{}"));
        assert_eq!(err.reason_class(None), ReasonClass::RateLimited);
    }

    #[test]
    fn rate_limit_with_quota_hint_is_quota_exhausted() {
        let err = DispatchError::Upstream(UpstreamError::new(ProviderId::Antigravity, 429, "{}"));
        assert_eq!(
            err.reason_class(Some(RateLimitReason::QuotaExhausted)),
            ReasonClass::QuotaExhausted
        );
    }

    #[test]
    fn routing_error_maps_to_not_found() {
        let err = DispatchError::Routing(RoutingError {
            model: "foo".into(),
            message: "no entries".into(),
        });
        assert_eq!(err.reason_class(None), ReasonClass::NotFound);
    }
}
