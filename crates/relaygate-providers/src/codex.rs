//! ChatGPT-Codex backend adapter.
//!
//! Codex exposes two upstream shapes: a plain chat-completions endpoint for
//! ordinary non-streaming calls, and an SSE-only `responses` endpoint whose
//! body carries a `response.completed` frame with any tool calls packed as
//! `function_call` items. `complete()` uses the `responses` endpoint for any
//! request that carries tools — it's the only one of the two that reports
//! tool calls — buffering the whole SSE body itself rather than handing
//! frames back to the caller, since this is the non-streaming call. The
//! ChatGPT backend host is the one place TLS verification is intentionally
//! disabled.

use async_trait::async_trait;
use futures_util::StreamExt;
use relaygate_accounts::Account;
use relaygate_common::ProviderId;
use serde_json::{Value, json};

use crate::adapter::{ProviderAdapter, WireStream};
use crate::catalog::CODEX_MODELS as MODELS;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{classify_transport_error, response_to_upstream_error, tls_bypass_client};
use crate::types::{CompletionRequest, CompletionResult, ContentBlock, ModelInfo, StopReason, Usage, WireFrame};

const CHAT_COMPLETIONS_URL: &str = "https://chatgpt.com/backend-api/codex/chat/completions";
const RESPONSES_URL: &str = "https://chatgpt.com/backend-api/codex/responses";
const TOKEN_URL: &str = "https://chatgpt.com/backend-api/codex/oauth/token";

pub struct CodexAdapter {
    client: reqwest::Client,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self {
            client: tls_bypass_client(),
        }
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexAdapter {
    /// Buffers the whole `responses` SSE body and parses its
    /// `response.completed` frame — used for non-streaming requests that
    /// carry tools, since the chat-completions endpoint doesn't report tool
    /// calls.
    async fn complete_via_responses(
        &self,
        account: &Account,
        model: &str,
        request: &CompletionRequest,
    ) -> ProviderResult<CompletionResult> {
        let body = build_body(model, request, true);
        let response = self
            .client
            .post(RESPONSES_URL)
            .bearer_auth(account.access_token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Codex, response).await.into());
        }
        let bytes = response.bytes().await.map_err(|e| classify_transport_error(&e))?;
        parse_responses_sse(&String::from_utf8_lossy(&bytes))
    }
}

fn build_body(model: &str, request: &CompletionRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": model,
        "messages": request.messages,
        "stream": stream,
    });
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(tools.clone());
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = Value::from(max_tokens);
    }
    body
}

/// Parses a plain (non-SSE) chat-completions JSON response.
fn parse_chat_completion(body: &[u8]) -> ProviderResult<CompletionResult> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Unsupported(parse_error_message(e)))?;
    let choice = value
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or(ProviderError::Unsupported("missing choices[0]"))?;
    let message = choice.get("message").cloned().unwrap_or(Value::Null);
    let mut blocks = Vec::new();

    if let Some(text) = message.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        blocks.push(ContentBlock::Text { text: text.to_string() });
    }
    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in tool_calls {
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let function = call.get("function").cloned().unwrap_or(Value::Null);
            let name = function.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let input = function
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(Value::Null);
            blocks.push(ContentBlock::ToolUse { id, name, input });
        }
    }

    let finish_reason = choice.get("finish_reason").and_then(Value::as_str).unwrap_or("stop");
    let usage = value.get("usage").cloned().unwrap_or(Value::Null);
    let input_tokens = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    let output_tokens = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;

    Ok(CompletionResult {
        content_blocks: blocks,
        stop_reason: StopReason::from_upstream(finish_reason),
        usage: Usage {
            input_tokens,
            output_tokens,
        },
    })
}

/// Parses Codex's `responses` SSE body: finds `response.completed` and
/// repacks `function_call` output items into `tool_use` blocks.
fn parse_responses_sse(body: &str) -> ProviderResult<CompletionResult> {
    let events = crate::sse::parse_events(body);
    let completed = crate::sse::find_event(&events, "response.completed")
        .ok_or(ProviderError::Unsupported("no response.completed frame"))?;
    let value: Value = serde_json::from_str(&completed.data)
        .map_err(|e| ProviderError::Unsupported(parse_error_message(e)))?;

    let output = value
        .get("response")
        .and_then(|r| r.get("output"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut blocks = Vec::new();
    for item in &output {
        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                if let Some(content) = item.get("content").and_then(Value::as_array) {
                    for part in content {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            blocks.push(ContentBlock::Text { text: text.to_string() });
                        }
                    }
                }
            }
            Some("function_call") => {
                let id = item.get("call_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = item.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let input = item
                    .get("arguments")
                    .and_then(Value::as_str)
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or(Value::Null);
                blocks.push(ContentBlock::ToolUse { id, name, input });
            }
            _ => {}
        }
    }

    let finish_reason = value
        .get("response")
        .and_then(|r| r.get("status"))
        .and_then(Value::as_str)
        .map(|s| if s == "incomplete" { "length" } else { "stop" })
        .unwrap_or("stop");

    let usage = value.get("response").and_then(|r| r.get("usage")).cloned().unwrap_or(Value::Null);
    let input_tokens = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    let output_tokens = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;

    Ok(CompletionResult {
        content_blocks: blocks,
        stop_reason: StopReason::from_upstream(finish_reason),
        usage: Usage {
            input_tokens,
            output_tokens,
        },
    })
}

fn parse_error_message(_e: serde_json::Error) -> &'static str {
    "malformed upstream response body"
}

#[async_trait]
impl ProviderAdapter for CodexAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Codex
    }

    fn supported_models(&self) -> &'static [ModelInfo] {
        MODELS
    }

    async fn complete(
        &self,
        account: &Account,
        model: &str,
        request: &CompletionRequest,
    ) -> ProviderResult<CompletionResult> {
        if request.tools.is_some() {
            return self.complete_via_responses(account, model, request).await;
        }

        let body = build_body(model, request, false);
        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(account.access_token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Codex, response).await.into());
        }
        let bytes = response.bytes().await.map_err(|e| classify_transport_error(&e))?;
        parse_chat_completion(&bytes)
    }

    async fn stream(
        &self,
        account: &Account,
        model: &str,
        request: &CompletionRequest,
    ) -> ProviderResult<WireStream> {
        let body = build_body(model, request, true);
        let response = self
            .client
            .post(RESPONSES_URL)
            .bearer_auth(account.access_token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Codex, response).await.into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(WireFrame).map_err(|e| classify_transport_error(&e).into()));
        Ok(Box::pin(stream))
    }

    async fn refresh(&self, account: &Account) -> ProviderResult<Account> {
        let Some(refresh_token) = &account.refresh_token else {
            return Err(ProviderError::Unsupported("no refresh token on account"));
        };
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Codex, response).await.into());
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        let mut updated = account.clone();
        if let Some(access) = value.get("access_token").and_then(Value::as_str) {
            updated.access_token = relaygate_common::Secret::new(access.to_string());
        }
        if let Some(refresh) = value.get("refresh_token").and_then(Value::as_str) {
            updated.refresh_token = Some(relaygate_common::Secret::new(refresh.to_string()));
        }
        if let Some(expires_in) = value.get("expires_in").and_then(Value::as_i64) {
            updated.expires_at = Some(chrono::Utc::now() + chrono::Duration::seconds(expires_in));
        }
        Ok(updated)
    }
}
