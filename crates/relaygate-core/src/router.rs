//! Wires the public HTTP surface onto `AppState`.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::handler::{chat_completions, health, list_models, messages};
use crate::state::AppState;

pub fn public_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/messages", post(messages))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .with_state(state)
}
