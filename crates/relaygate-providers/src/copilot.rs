//! GitHub-Copilot backend adapter. Bearer auth, OpenAI-shaped
//! chat-completions wire, strict TLS (no named bypass for this host).

use async_trait::async_trait;
use futures_util::StreamExt;
use relaygate_accounts::Account;
use relaygate_common::ProviderId;
use serde_json::{Value, json};

use crate::adapter::{ProviderAdapter, WireStream};
use crate::catalog::COPILOT_MODELS as MODELS;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{classify_transport_error, response_to_upstream_error, strict_client};
use crate::types::{CompletionRequest, CompletionResult, ContentBlock, ModelInfo, StopReason, Usage, WireFrame};

const CHAT_COMPLETIONS_URL: &str = "https://api.githubcopilot.com/chat/completions";
const TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";

pub struct CopilotAdapter {
    client: reqwest::Client,
}

impl CopilotAdapter {
    pub fn new() -> Self {
        Self {
            client: strict_client(),
        }
    }
}

impl Default for CopilotAdapter {
    fn default() -> Self {
        Self::new()
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

fn parse_chat_completion(body: &[u8]) -> ProviderResult<CompletionResult> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ProviderError::Unsupported("malformed upstream response body"))?;
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

#[async_trait]
impl ProviderAdapter for CopilotAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Copilot
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
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(account.access_token.expose())
            .header("Copilot-Integration-Id", "vscode-chat")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Copilot, response).await.into());
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
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(account.access_token.expose())
            .header("Copilot-Integration-Id", "vscode-chat")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Copilot, response).await.into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(WireFrame).map_err(|e| classify_transport_error(&e).into()));
        Ok(Box::pin(stream))
    }

    async fn refresh(&self, account: &Account) -> ProviderResult<Account> {
        // Copilot exchanges a GitHub OAuth token for a short-lived Copilot
        // session token; the account's access_token here is that GitHub
        // token and acts as its own "refresh token" source.
        let response = self
            .client
            .get(TOKEN_URL)
            .bearer_auth(account.access_token.expose())
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(response_to_upstream_error(ProviderId::Copilot, response).await.into());
        }

        let value: Value = response.json().await.map_err(|e| classify_transport_error(&e))?;
        let mut updated = account.clone();
        if let Some(token) = value.get("token").and_then(Value::as_str) {
            updated.refresh_token = Some(relaygate_common::Secret::new(token.to_string()));
        }
        if let Some(expires_at) = value.get("expires_at").and_then(Value::as_i64) {
            updated.expires_at = chrono::DateTime::from_timestamp(expires_at, 0);
        }
        Ok(updated)
    }
}
