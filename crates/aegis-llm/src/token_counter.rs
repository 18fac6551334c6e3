//! Heuristic token counting.
//!
//! No precise per-model encoder ships with the engine, so counting uses a
//! deterministic approximation of roughly 4 characters per token. Message
//! counting adds a small constant per-message overhead for role markers
//! and separators, and tool schemas are counted through their serialized
//! JSON form — the model "sees" them in the prompt.

use serde_json::Value;

use crate::types::Message;

/// Per-message overhead (role, separators, priming).
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate token counts for text and message lists.
#[derive(Debug, Clone, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a counter.
    pub fn new() -> Self {
        Self
    }

    /// Estimated token count for a plain string.
    pub fn count_text(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() / 4).max(1)
    }

    /// Estimated token cost of a single message, including its tool calls
    /// and tool_call_id.
    pub fn count_message(&self, msg: &Message) -> usize {
        let mut tokens = MESSAGE_OVERHEAD + self.count_text(&msg.content);

        for tc in &msg.tool_calls {
            tokens += self.count_text(&tc.name);
            tokens += self.count_text(&tc.arguments.to_string());
        }

        if let Some(id) = &msg.tool_call_id {
            tokens += self.count_text(id);
        }

        tokens
    }

    /// Estimated total token count for a conversation, optionally
    /// including a tool schema list.
    pub fn count_messages(&self, messages: &[Message], tools: Option<&[Value]>) -> usize {
        let mut total: usize = messages.iter().map(|m| self.count_message(m)).sum();

        if let Some(tools) = tools {
            if !tools.is_empty() {
                if let Ok(serialized) = serde_json::to_string(tools) {
                    total += self.count_text(&serialized);
                }
            }
        }

        total
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(TokenCounter::new().count_text(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(TokenCounter::new().count_text("ab"), 1);
    }

    #[test]
    fn four_chars_per_token() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_text(&"x".repeat(40)), 10);
    }

    #[test]
    fn message_overhead_applied() {
        let counter = TokenCounter::new();
        let msg = Message::user("12345678");
        assert_eq!(counter.count_message(&msg), MESSAGE_OVERHEAD + 2);
    }

    #[test]
    fn tool_calls_and_ids_counted() {
        let counter = TokenCounter::new();

        let with_calls = Message::assistant_tool_calls(
            "",
            vec![ToolCall {
                id: "c1".into(),
                name: "echo".into(),
                arguments: json!({"message": "hello"}),
            }],
        );
        let without = Message::assistant("");
        assert!(counter.count_message(&with_calls) > counter.count_message(&without));

        let tool_msg = Message::tool_result("call_12345678", "out");
        let plain = Message::assistant("out");
        assert!(counter.count_message(&tool_msg) > counter.count_message(&plain));
    }

    #[test]
    fn tool_schemas_add_cost() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("hi")];
        let schemas = vec![json!({
            "name": "echo",
            "description": "Echoes the input message back.",
            "parameters": {"type": "object", "properties": {"message": {"type": "string"}}}
        })];

        let bare = counter.count_messages(&messages, None);
        let with_tools = counter.count_messages(&messages, Some(&schemas));
        assert!(with_tools > bare);
    }
}
