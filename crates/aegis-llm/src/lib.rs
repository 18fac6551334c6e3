//! LLM routing for Aegis.
//!
//! Providers implement [`Provider`] and register with the [`LlmRouter`].
//! The router streams [`StreamChunk`]s from the active provider and drives
//! the [`ToolCallAssembler`] to turn interleaved tool-call fragments into
//! one [`AssembledAssistant`] per turn.

pub mod assembler;
pub mod error;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod router;
pub mod token_counter;
pub mod types;

pub use assembler::ToolCallAssembler;
pub use error::{LlmError, LlmResult};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::{ChunkStream, Provider};
pub use router::LlmRouter;
pub use token_counter::TokenCounter;
pub use types::{AssembledAssistant, Message, RawToolDelta, Role, StreamChunk, ToolCall};
