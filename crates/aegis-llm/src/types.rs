//! Core types for LLM interaction.
//!
//! These types model the data flowing between the orchestrator and LLM
//! providers. They are provider-agnostic at this layer; concrete providers
//! translate them into their own wire formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the LLM.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// For [`Role::Tool`] messages this contains the rendered tool result.
    /// For [`Role::Assistant`] messages that contain tool calls only, this
    /// may be empty.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (only present when
    /// `role == Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message is a response to
    /// (only present when `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Model that produced the message, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider that produced the message, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Message {
    fn bare(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            model: None,
            provider: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::bare(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::bare(Role::User, content)
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::bare(Role::Assistant, content)
    }

    /// Create an assistant message that contains tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::bare(Role::Assistant, content)
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::bare(Role::Tool, content)
        }
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A resolved tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier (within a turn) for correlating results.
    pub id: String,

    /// The name of the tool to invoke.
    pub name: String,

    /// Parsed arguments as a JSON value.
    pub arguments: Value,
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// An incremental fragment of a streaming tool call.
///
/// Providers emit these as tool-call fragments arrive; the
/// [`crate::assembler::ToolCallAssembler`] accumulates them into finished
/// [`ToolCall`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawToolDelta {
    /// Stable integer keying a partial call within the stream.
    pub call_index: u32,
    /// Call id, when the provider has sent it.
    pub id: Option<String>,
    /// Fragment to append to the tool name.
    pub name_delta: String,
    /// Fragment to append to the JSON argument string.
    pub args_delta: String,
    /// Finalizes this call index.
    pub done: bool,
}

/// A single chunk yielded while streaming a chat completion.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// New text content.
    pub delta: String,
    /// Incremental tool-call fragments.
    pub tool_deltas: Vec<RawToolDelta>,
    /// `true` on the final chunk.
    pub done: bool,
}

impl StreamChunk {
    /// A chunk carrying only text.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            ..Self::default()
        }
    }

    /// The terminating chunk.
    pub fn finished() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// The complete assistant turn after consuming the full stream.
///
/// Produced by [`crate::router::LlmRouter::chat_complete`].
#[derive(Debug, Clone, Default)]
pub struct AssembledAssistant {
    /// Accumulated text content.
    pub content: String,
    /// Successfully assembled tool calls, in stream order.
    pub tool_calls: Vec<ToolCall>,
    /// Model that produced the turn, when known.
    pub model: Option<String>,
    /// Provider that produced the turn.
    pub provider: Option<String>,
    /// Assembly failures; non-empty means `tool_calls` was discarded.
    pub assembler_errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);

        let tool = Message::tool_result("call_1", "out");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn assistant_tool_calls_carries_calls() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![ToolCall {
                id: "c1".into(),
                name: "echo".into(),
                arguments: json!({"message": "hi"}),
            }],
        );
        assert_eq!(msg.tool_calls.len(), 1);
        assert!(msg.content.is_empty());
    }

    #[test]
    fn message_serde_skips_empty_fields() {
        let v = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(v["role"], "user");
        assert!(v.get("tool_calls").is_none());
        assert!(v.get("tool_call_id").is_none());
    }
}
