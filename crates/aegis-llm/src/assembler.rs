//! Assembles streaming tool-call deltas into complete [`ToolCall`]s.
//!
//! [`RawToolDelta`] fragments accumulate keyed by `call_index`. A call is
//! finalized when a delta arrives with `done = true`, or when [`flush`]
//! runs at stream end. Finalization JSON-parses the accumulated argument
//! string; on parse failure the call is dropped and an error recorded so
//! the router can surface the failure as a protocol error.
//!
//! [`flush`]: ToolCallAssembler::flush

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::types::{RawToolDelta, ToolCall};

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    args: String,
}

/// Buffers raw tool-call deltas and emits finished [`ToolCall`]s.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    // BTreeMap so flush() finalizes in ascending index order.
    buffers: BTreeMap<u32, PartialCall>,
    errors: Vec<String>,
}

impl ToolCallAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembly errors recorded so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Feed a single delta into the assembler.
    ///
    /// Returns the completed [`ToolCall`], if this delta finalized one.
    pub fn feed(&mut self, delta: &RawToolDelta) -> Option<ToolCall> {
        let buf = self.buffers.entry(delta.call_index).or_default();

        if buf.id.is_none() {
            if let Some(id) = &delta.id {
                buf.id = Some(id.clone());
            }
        }

        buf.name.push_str(&delta.name_delta);
        buf.args.push_str(&delta.args_delta);

        if delta.done {
            return self.finalize(delta.call_index);
        }

        None
    }

    /// Finalize *all* remaining buffers, regardless of whether a `done`
    /// delta was received. Useful at stream end.
    pub fn flush(&mut self) -> Vec<ToolCall> {
        let indices: Vec<u32> = self.buffers.keys().copied().collect();
        indices
            .into_iter()
            .filter_map(|idx| self.finalize(idx))
            .collect()
    }

    /// Discard all accumulated state.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.errors.clear();
    }

    fn finalize(&mut self, idx: u32) -> Option<ToolCall> {
        let buf = self.buffers.remove(&idx)?;

        let raw_args = if buf.args.is_empty() { "{}" } else { &buf.args };
        let arguments: Value = match serde_json::from_str(raw_args) {
            Ok(v) => v,
            Err(err) => {
                warn!(call_index = idx, %err, "tool call arguments failed to parse");
                self.errors
                    .push(format!("tool_call_json_parse_failed idx={idx} err={err}"));
                return None;
            }
        };

        Some(ToolCall {
            id: buf.id.unwrap_or_else(|| format!("call_{idx}")),
            name: buf.name.trim().to_owned(),
            arguments,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
