//! Public HTTP handlers: `/v1/chat/completions`, `/v1/messages`,
//! `/v1/models`, `/health`. Thin glue — all dispatch-core logic lives in
//! `relaygate-routing`/`relaygate-dispatch`; this module only classifies,
//! calls through, and re-encodes.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use relaygate_providers::ModelCatalog;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::logical::{LogicalRequest, PublicShape, classify_anthropic, classify_openai};
use crate::state::AppState;
use crate::wire::{encode_anthropic, encode_openai};

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut ids = Vec::new();
    for provider in relaygate_common::ProviderId::ALL {
        for model in state.catalog.models(provider) {
            if !model.hidden {
                ids.push(json!({ "id": model.id, "object": "model", "owned_by": provider.as_str() }));
            }
        }
    }
    Json(json!({ "object": "list", "data": ids }))
}

pub async fn chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match classify_openai(&body) {
        Ok(logical) => dispatch_logical(state, logical).await,
        Err(err) => err.into_response(),
    }
}

pub async fn messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match classify_anthropic(&body) {
        Ok(logical) => dispatch_logical(state, logical).await,
        Err(err) => err.into_response(),
    }
}

async fn dispatch_logical(state: Arc<AppState>, logical: LogicalRequest) -> Response {
    let trace_id = Uuid::new_v4();
    let model = logical.completion.model.clone();
    let started = Instant::now();

    let document = match state.routing_document().await {
        Ok(document) => document,
        Err(err) => {
            warn!(%trace_id, error = %err, "failed to load routing config");
            return ProxyError::internal(
                json!({ "error": { "type": "internal_error", "message": "failed to load routing config" } })
                    .to_string(),
            )
            .into_response();
        }
    };

    let route = match relaygate_routing::resolve(
        &document,
        &state.catalog as &dyn ModelCatalog,
        &state.accounts,
        &model,
    )
    .await
    {
        Ok(route) => route,
        Err(routing_err) => {
            return ProxyError::from(relaygate_common::DispatchError::Routing(routing_err)).into_response();
        }
    };

    info!(%trace_id, %model, stream = logical.stream, "dispatching request");

    if logical.stream {
        return match state.dispatch.dispatch_stream(route, &logical.completion).await {
            Ok(stream) => {
                let body_stream = stream.map(|frame| frame.map(|f| f.0));
                Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "text/event-stream")
                    .body(Body::from_stream(body_stream))
                    .expect("status/headers are always valid")
            }
            Err(err) => {
                warn!(%trace_id, %model, elapsed_ms = started.elapsed().as_millis() as u64, "dispatch failed");
                ProxyError::from(err).into_response()
            }
        };
    }

    match state.dispatch.dispatch_complete(route, &logical.completion).await {
        Ok(result) => {
            info!(
                %trace_id,
                %model,
                elapsed_ms = started.elapsed().as_millis() as u64,
                input_tokens = result.usage.input_tokens,
                output_tokens = result.usage.output_tokens,
                "dispatch succeeded"
            );
            let value = match logical.shape {
                PublicShape::OpenAi => encode_openai(&model, &result),
                PublicShape::Anthropic => encode_anthropic(&model, &result),
            };
            Json(value).into_response()
        }
        Err(err) => {
            warn!(%trace_id, %model, elapsed_ms = started.elapsed().as_millis() as u64, "dispatch failed");
            ProxyError::from(err).into_response()
        }
    }
}
