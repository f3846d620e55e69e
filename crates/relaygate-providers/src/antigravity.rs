//! Antigravity backend adapter.
//!
//! The real upstream speaks a protobuf-encoded request body over an
//! OAuth-cookie-bound session; the protobuf encoder itself is explicitly
//! out of scope. This adapter stands in an equivalent JSON body and a
//! `Cookie` header built from the account's access token, so the
//! dispatch-facing contract (`ProviderAdapter`) is exercised the same way
//! a real encoder would be.
//! Antigravity's 429s carry `RetryInfo`/`quotaResetDelay` in the JSON body,
//! which the retry evaluator (not this adapter) is responsible for reading
//! back out of the raw error body.

use async_trait::async_trait;
use futures_util::StreamExt;
use relaygate_accounts::Account;
use relaygate_common::ProviderId;
use serde_json::{Value, json};

use crate::adapter::{ProviderAdapter, WireStream};
use crate::catalog::ANTIGRAVITY_MODELS as MODELS;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{classify_transport_error, response_to_upstream_error, strict_client};
use crate::types::{CompletionRequest, CompletionResult, ContentBlock, ModelInfo, StopReason, Usage, WireFrame};

const GENERATE_URL: &str = "https://antigravity.googleapis.com/v1/chat:generate";
const STREAM_URL: &str = "https://antigravity.googleapis.com/v1/chat:streamGenerate";

pub struct AntigravityAdapter {
    client: reqwest::Client,
}

impl AntigravityAdapter {
    pub fn new() -> Self {
        Self {
            client: strict_client(),
        }
    }
}

impl Default for AntigravityAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn build_body(model: &str, request: &CompletionRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": model,
        "contents": request.messages,
        "stream": stream,
    });
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(tools.clone());
    }
    if let Some(max_tokens) = request.max_tokens {
        body["generationConfig"] = json!({ "maxOutputTokens": max_tokens });
    }
    body
}

/// Session cookie Antigravity binds its per-account rate-limit state to.
/// The real value is opaque to us; the access token stands in for it here.
fn session_cookie(account: &Account) -> String {
    format!("antigravity_session={}", account.access_token.expose())
}

fn parse_generate_response(body: &[u8]) -> ProviderResult<CompletionResult> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ProviderError::Unsupported("malformed upstream response body"))?;
    let candidate = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or(ProviderError::Unsupported("missing candidates[0]"))?;

    let mut blocks = Vec::new();
    if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(Value::as_array) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                blocks.push(ContentBlock::Text { text: text.to_string() });
            } else if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let input = call.get("args").cloned().unwrap_or(Value::Null);
                blocks.push(ContentBlock::ToolUse {
                    id: name.clone(),
                    name,
                    input,
                });
            }
        }
    }

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .map(|s| match s {
            "STOP" => "stop",
            "MAX_TOKENS" => "length",
            "FUNCTION_CALL" => "tool_calls",
            _ => "stop",
        })
        .unwrap_or("stop");

    let usage = value.get("usageMetadata").cloned().unwrap_or(Value::Null);
    let input_tokens = usage.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
    let output_tokens = usage.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;

    Ok(CompletionResult {
        content_blocks: blocks,
        stop_reason: StopReason::from_upstream(finish_reason),
        usage: Usage {
            input_tokens,
            output_tokens,
        },
    })
}

#[async_trait]
impl ProviderAdapter for AntigravityAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Antigravity
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
        let body = build_body(model, request, false);
        let response = self
            .client
            .post(GENERATE_URL)
            .header(reqwest::header::COOKIE, session_cookie(account))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Antigravity, response).await.into());
        }
        let bytes = response.bytes().await.map_err(|e| classify_transport_error(&e))?;
        parse_generate_response(&bytes)
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
            .post(STREAM_URL)
            .header(reqwest::header::COOKIE, session_cookie(account))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Antigravity, response).await.into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(WireFrame).map_err(|e| classify_transport_error(&e).into()));
        Ok(Box::pin(stream))
    }

    // Antigravity's cookie is derived from the OAuth session itself; there is
    // no separate refresh-token exchange modeled here, so this falls through to the default
    // `Unsupported` implementation.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_candidate() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"hi"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":1}}"#;
        let result = parse_generate_response(body).unwrap();
        assert_eq!(result.content_blocks, vec![ContentBlock::Text { text: "hi".into() }]);
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.usage, Usage { input_tokens: 4, output_tokens: 1 });
    }

    #[test]
    fn parses_function_call_candidate() {
        let body = br#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"lookup","args":{"q":"x"}}}]},"finishReason":"FUNCTION_CALL"}]}"#;
        let result = parse_generate_response(body).unwrap();
        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert_eq!(
            result.content_blocks,
            vec![ContentBlock::ToolUse {
                id: "lookup".into(),
                name: "lookup".into(),
                input: json!({"q": "x"})
            }]
        );
    }

    #[test]
    fn max_tokens_finish_reason_maps_correctly() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"cut"}]},"finishReason":"MAX_TOKENS"}]}"#;
        let result = parse_generate_response(body).unwrap();
        assert_eq!(result.stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn missing_candidates_is_an_error() {
        assert!(parse_generate_response(b"{}").is_err());
    }

    #[test]
    fn session_cookie_carries_the_access_token() {
        let account = Account::new("acct-1", "tok-abc");
        assert_eq!(session_cookie(&account), "antigravity_session=tok-abc");
    }
}
