//! Maps the dispatch engine's error kinds onto the public HTTP response
//! each one should produce.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use relaygate_common::DispatchError;
use tracing::warn;

#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProxyError {
    pub fn bad_request(message: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: message.into(),
        }
    }

    pub fn internal(message: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: message.into(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        Response::builder()
            .status(self.status)
            .header("content-type", "application/json")
            .body(Body::from(self.body))
            .expect("status/headers are always valid")
    }
}

/// `400` for a routing error (naming the logical model); otherwise the
/// upstream's own status/body verbatim, or `500` for anything unexpected.
impl From<DispatchError> for ProxyError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Routing(routing) => {
                warn!(model = %routing.model, message = %routing.message, "routing error");
                ProxyError::bad_request(
                    serde_json::json!({
                        "error": {
                            "type": "routing_error",
                            "message": format!("no usable route for model '{}': {}", routing.model, routing.message),
                        }
                    })
                    .to_string(),
                )
            }
            DispatchError::Upstream(upstream) => {
                let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
                ProxyError {
                    status,
                    body: upstream.body,
                }
            }
            DispatchError::Http(http) => {
                let status = StatusCode::from_u16(http.status).unwrap_or(StatusCode::BAD_GATEWAY);
                ProxyError {
                    status,
                    body: http.body,
                }
            }
            DispatchError::Transport(transport) => {
                warn!(kind = ?transport.kind, message = %transport.message, "transport error exhausted all entries");
                ProxyError::internal(
                    serde_json::json!({
                        "error": { "type": "transport_error", "message": transport.message }
                    })
                    .to_string(),
                )
            }
        }
    }
}
