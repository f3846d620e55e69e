//! Encodes a dispatch-engine `CompletionResult` back into the caller's
//! chosen public shape. Streaming frames are forwarded verbatim from the
//! adapter instead — re-encoding a streamed body into the *other* public
//! shape would mean a full wire-schema translation layer, which is out of
//! scope, so streaming responses carry whatever shape their upstream speaks.

use relaygate_providers::{CompletionResult, ContentBlock, StopReason};
use serde_json::{Value, json};
use uuid::Uuid;

fn openai_finish_reason(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "stop",
        StopReason::ToolUse => "tool_calls",
        StopReason::MaxTokens => "length",
        StopReason::StopSequence => "stop",
    }
}

fn anthropic_stop_reason(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "end_turn",
        StopReason::ToolUse => "tool_use",
        StopReason::MaxTokens => "max_tokens",
        StopReason::StopSequence => "stop_sequence",
    }
}

/// Renders `result` as an OpenAI `chat.completion` object.
pub fn encode_openai(model: &str, result: &CompletionResult) -> Value {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &result.content_blocks {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string(),
                    }
                }));
            }
        }
    }

    let mut message = json!({ "role": "assistant", "content": if text.is_empty() { Value::Null } else { Value::String(text) } });
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }

    json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4()),
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": openai_finish_reason(result.stop_reason),
        }],
        "usage": {
            "prompt_tokens": result.usage.input_tokens,
            "completion_tokens": result.usage.output_tokens,
            "total_tokens": result.usage.input_tokens + result.usage.output_tokens,
        }
    })
}

/// Renders `result` as an Anthropic `message` object.
pub fn encode_anthropic(model: &str, result: &CompletionResult) -> Value {
    let content: Vec<Value> = result
        .content_blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
            ContentBlock::ToolUse { id, name, input } => {
                json!({ "type": "tool_use", "id": id, "name": name, "input": input })
            }
        })
        .collect();

    json!({
        "id": format!("msg_{}", Uuid::new_v4()),
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": anthropic_stop_reason(result.stop_reason),
        "usage": {
            "input_tokens": result.usage.input_tokens,
            "output_tokens": result.usage.output_tokens,
        }
    })
}
