//! Token-budgeted context window packer.
//!
//! Given a message history, an optional tool schema list and a system
//! prompt, [`ContextPacker::pack`] trims the conversation to fit a token
//! budget. The most recent suffix of ordinary messages is preserved
//! whole, system messages are always kept, and the output-token and
//! caller reserves are never eaten into.

use serde_json::Value;

use aegis_llm::{Message, Role, TokenCounter};

/// Token accounting for one packing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPackReport {
    /// Context window ceiling the pack targeted.
    pub max_context_tokens: usize,
    /// Output-token reservation subtracted from the window.
    pub max_output_tokens: usize,
    /// Hard caller-specified reserve subtracted from the window.
    pub reserve_tokens: usize,
    /// Cost of the serialized tool schemas.
    pub tool_schema_tokens: usize,
    /// Cost of the system prompt.
    pub system_prompt_tokens: usize,
    /// Cost of the kept messages.
    pub message_tokens: usize,
    /// Number of messages kept.
    pub kept_messages: usize,
    /// Number of messages dropped.
    pub dropped_messages: usize,
}

/// Packs a conversation into a token budget.
#[derive(Debug, Clone, Default)]
pub struct ContextPacker {
    counter: TokenCounter,
}

impl ContextPacker {
    /// Create a packer using the heuristic token counter.
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    /// Fit `messages` into the available budget.
    ///
    /// Returns the trimmed message list (in original order) and a report
    /// describing what was kept and dropped.
    pub fn pack(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        system_prompt: &str,
        max_context_tokens: usize,
        max_output_tokens: usize,
        reserve_tokens: usize,
    ) -> (Vec<Message>, ContextPackReport) {
        // -- fixed costs ------------------------------------------------
        let tool_schema_tokens = match tools {
            Some(tools) if !tools.is_empty() => serde_json::to_string(tools)
                .map(|s| self.counter.count_text(&s))
                .unwrap_or(0),
            _ => 0,
        };
        let system_prompt_tokens = self.counter.count_text(system_prompt);

        let budget = max_context_tokens
            .saturating_sub(max_output_tokens)
            .saturating_sub(reserve_tokens)
            .saturating_sub(tool_schema_tokens)
            .saturating_sub(system_prompt_tokens);

        // -- system messages are always kept ----------------------------
        let system_tokens: usize = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| self.counter.count_message(m))
            .sum();
        let remaining_budget = budget.saturating_sub(system_tokens);

        // -- walk newest to oldest, stop at first overflow ---------------
        let mut kept = vec![false; messages.len()];
        let mut running_tokens = 0usize;
        let mut full = false;

        for (idx, msg) in messages.iter().enumerate().rev() {
            if msg.role == Role::System {
                kept[idx] = true;
                continue;
            }
            if full {
                continue;
            }
            let cost = self.counter.count_message(msg);
            if running_tokens + cost <= remaining_budget {
                running_tokens += cost;
                kept[idx] = true;
            } else {
                // Keep the suffix contiguous: no skipping ahead to find
                // smaller, older messages.
                full = true;
            }
        }

        let kept_messages: Vec<Message> = messages
            .iter()
            .zip(&kept)
            .filter(|(_, keep)| **keep)
            .map(|(m, _)| m.clone())
            .collect();

        let report = ContextPackReport {
            max_context_tokens,
            max_output_tokens,
            reserve_tokens,
            tool_schema_tokens,
            system_prompt_tokens,
            message_tokens: system_tokens + running_tokens,
            kept_messages: kept_messages.len(),
            dropped_messages: messages.len() - kept_messages.len(),
        };

        (kept_messages, report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
