//! Classifies the two public request shapes into one wire-agnostic
//! `LogicalRequest` the dispatch engine understands. Full OpenAI/Anthropic
//! message-shape translation is out of scope; `messages`/`tools` stay
//! opaque JSON.

use relaygate_providers::CompletionRequest;
use serde_json::Value;

use crate::error::ProxyError;

/// Which public shape a request arrived in — only used to pick the response
/// encoder; dispatch itself is shape-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicShape {
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone)]
pub struct LogicalRequest {
    pub shape: PublicShape,
    pub completion: CompletionRequest,
    pub stream: bool,
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

fn max_tokens_field(body: &Value) -> Option<u32> {
    body.get("max_tokens")
        .or_else(|| body.get("max_completion_tokens"))
        .or_else(|| body.get("max_output_tokens"))
        .and_then(Value::as_u64)
        .map(|v| v as u32)
}

/// Classifies a `POST /v1/chat/completions` body.
pub fn classify_openai(body: &[u8]) -> Result<LogicalRequest, ProxyError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ProxyError::bad_request(format!("invalid json: {err}")))?;

    // A request with no `model` at all still needs a logical model to
    // route on, rather than failing outright.
    let model = string_field(&value, "model").unwrap_or_else(crate::config::codex_fallback_model);
    let messages = value
        .get("messages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let tools = value.get("tools").and_then(Value::as_array).cloned();
    let stream = value.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(LogicalRequest {
        shape: PublicShape::OpenAi,
        completion: CompletionRequest {
            model,
            messages,
            tools,
            max_tokens: max_tokens_field(&value),
        },
        stream,
    })
}

/// Classifies a `POST /v1/messages` body. Anthropic's
/// `system` prompt, when present, is folded in as a leading message so the
/// opaque `messages` array the dispatch engine forwards still carries it —
/// adapters receive it the same way as any other message content.
pub fn classify_anthropic(body: &[u8]) -> Result<LogicalRequest, ProxyError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ProxyError::bad_request(format!("invalid json: {err}")))?;

    let model = string_field(&value, "model")
        .ok_or_else(|| ProxyError::bad_request("missing 'model' field"))?;
    let mut messages = Vec::new();
    if let Some(system) = value.get("system") {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    if let Some(rest) = value.get("messages").and_then(Value::as_array) {
        messages.extend(rest.iter().cloned());
    }
    let tools = value.get("tools").and_then(Value::as_array).cloned();
    let stream = value.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(LogicalRequest {
        shape: PublicShape::Anthropic,
        completion: CompletionRequest {
            model,
            messages,
            tools,
            max_tokens: max_tokens_field(&value),
        },
        stream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_classify_extracts_model_and_stream() {
        let body = br#"{"model":"gpt-5","messages":[{"role":"user","content":"hi"}],"stream":true,"max_tokens":256}"#;
        let logical = classify_openai(body).unwrap();
        assert_eq!(logical.completion.model, "gpt-5");
        assert!(logical.stream);
        assert_eq!(logical.completion.max_tokens, Some(256));
        assert_eq!(logical.completion.messages.len(), 1);
    }

    #[test]
    fn openai_classify_falls_back_to_codex_default_model() {
        let body = br#"{"messages":[]}"#;
        let logical = classify_openai(body).unwrap();
        assert_eq!(logical.completion.model, "gpt-5");
    }

    #[test]
    fn anthropic_classify_folds_system_into_messages() {
        let body = br#"{"model":"claude-sonnet-4.5","system":"be terse","messages":[{"role":"user","content":"hi"}]}"#;
        let logical = classify_anthropic(body).unwrap();
        assert_eq!(logical.completion.messages.len(), 2);
        assert_eq!(logical.completion.messages[0]["role"], "system");
    }

    #[test]
    fn anthropic_classify_reads_max_tokens_synonym() {
        let body = br#"{"model":"gpt-4.1","messages":[],"max_output_tokens":128}"#;
        let logical = classify_anthropic(body).unwrap();
        assert_eq!(logical.completion.max_tokens, Some(128));
    }
}
