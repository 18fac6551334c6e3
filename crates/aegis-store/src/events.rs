//! Session event model.
//!
//! Every interaction in a session is recorded as a [`SessionEvent`].
//! Events are immutable once created. The payload is a sum type over the
//! seven event kinds; on disk it is stored as an `event_type` column plus
//! a payload JSON object, which keeps migrations trivial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Payload
// ═══════════════════════════════════════════════════════════════════════

/// Type-specific data carried by a [`SessionEvent`].
///
/// Serialized internally-tagged so the tag can be split out into the
/// `event_type` column (see [`EventPayload::to_row_parts`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Input from the human user.
    UserMessage { content: String },

    /// Text produced by the assistant.
    AssistantMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// The assistant requested a tool invocation.
    ToolCallRequest {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// Outcome of a tool invocation.
    ToolCallResult {
        tool_call_id: String,
        tool_name: String,
        success: bool,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        #[serde(default)]
        metadata: Value,
    },

    /// The user accepted or rejected a gated tool call.
    Confirmation {
        tool_call_id: String,
        tool_name: String,
        confirmed: bool,
    },

    /// The active model changed mid-session.
    ModelSwitch {
        from_model: String,
        to_model: String,
    },

    /// The provider stream violated the tool-call protocol.
    ProtocolError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl EventPayload {
    /// The wire name of this event kind (the `event_type` column value).
    pub fn event_type(&self) -> EventType {
        match self {
            Self::UserMessage { .. } => EventType::UserMessage,
            Self::AssistantMessage { .. } => EventType::AssistantMessage,
            Self::ToolCallRequest { .. } => EventType::ToolCallRequest,
            Self::ToolCallResult { .. } => EventType::ToolCallResult,
            Self::Confirmation { .. } => EventType::Confirmation,
            Self::ModelSwitch { .. } => EventType::ModelSwitch,
            Self::ProtocolError { .. } => EventType::ProtocolError,
        }
    }

    /// Split into `(event_type, payload_json)` for storage.
    pub fn to_row_parts(&self) -> StoreResult<(EventType, Value)> {
        let mut value = serde_json::to_value(self)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| StoreError::MalformedEvent {
                reason: "payload did not serialize to an object".into(),
            })?;
        obj.remove("event_type");
        Ok((self.event_type(), value))
    }

    /// Rebuild from the stored `(event_type, payload_json)` pair.
    pub fn from_row_parts(event_type: &str, mut payload: Value) -> StoreResult<Self> {
        let obj = payload
            .as_object_mut()
            .ok_or_else(|| StoreError::MalformedEvent {
                reason: format!("payload for {event_type} is not an object"),
            })?;
        obj.insert("event_type".into(), Value::String(event_type.to_owned()));
        serde_json::from_value(payload).map_err(|e| StoreError::MalformedEvent {
            reason: format!("cannot decode {event_type} payload: {e}"),
        })
    }
}

/// The seven event kinds, as stored in the `event_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    AssistantMessage,
    ToolCallRequest,
    ToolCallResult,
    Confirmation,
    ModelSwitch,
    ProtocolError,
}

impl EventType {
    /// The string stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserMessage => "user_message",
            Self::AssistantMessage => "assistant_message",
            Self::ToolCallRequest => "tool_call_request",
            Self::ToolCallResult => "tool_call_result",
            Self::Confirmation => "confirmation",
            Self::ModelSwitch => "model_switch",
            Self::ProtocolError => "protocol_error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Event
// ═══════════════════════════════════════════════════════════════════════

/// A single event in a session's history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// Unique identifier for the event (UUID v7).
    pub event_id: String,
    /// Groups events that belong to the same user turn.
    pub turn_id: String,
    /// UTC timestamp of event creation.
    pub timestamp: DateTime<Utc>,
    /// Event-specific data.
    pub payload: EventPayload,
}

impl SessionEvent {
    /// Create a new event with a fresh id and the current time.
    pub fn new(turn_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            turn_id: turn_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The event kind.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

// ── tests ────────────────────────────────────────────────────────────
