//! The wire-agnostic request/response shapes the dispatch engine and
//! provider adapters exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A logical request, already stripped of its OpenAI/Anthropic envelope by
/// the (out-of-core) public handler. `messages` and `tools` stay opaque
/// JSON — full wire-shape translation is explicitly out of scope.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub tools: Option<Vec<Value>>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Maps an upstream `finish_reason` string: `stop` ->
    /// `end_turn`, `length` -> `max_tokens`, `tool_calls` -> `tool_use`,
    /// anything else passes through as `end_turn`.
    pub fn from_upstream(finish_reason: &str) -> Self {
        match finish_reason {
            "stop" => StopReason::EndTurn,
            "length" => StopReason::MaxTokens,
            "tool_calls" => StopReason::ToolUse,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub content_blocks: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// One frame of an already-wire-formatted SSE stream. The engine treats
/// this as opaque bytes to forward to the client; only whether it is the
/// *first* frame matters for the mid-stream-failover rule.
#[derive(Debug, Clone)]
pub struct WireFrame(pub bytes::Bytes);

/// Static catalog entry for one upstream model id. `hidden` models are filtered out of routing resolution but
/// still compiled in, so re-enabling one is a code change, not data loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub hidden: bool,
}

impl ModelInfo {
    pub const fn visible(id: &'static str) -> Self {
        Self { id, hidden: false }
    }

    pub const fn hidden(id: &'static str) -> Self {
        Self { id, hidden: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_mapping_matches_spec_table() {
        assert_eq!(StopReason::from_upstream("stop"), StopReason::EndTurn);
        assert_eq!(StopReason::from_upstream("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_upstream("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_upstream("whatever"), StopReason::EndTurn);
    }
}
