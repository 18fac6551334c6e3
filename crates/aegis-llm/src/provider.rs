//! Abstract interface for LLM providers.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use serde_json::Value;

use crate::error::LlmResult;
use crate::types::{Message, StreamChunk};

/// A boxed async stream of chunks from a provider.
///
/// The stream is lazy, finite and non-restartable; the last chunk has
/// `done = true`. Dropping the stream cancels the underlying transport.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmResult<StreamChunk>> + Send>>;

/// Trait that every LLM adapter must implement.
///
/// Implementations are provider-specific adapters that translate between
/// the engine's types and the wire format of a concrete endpoint. The
/// router never assumes any specific wire format.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name (e.g. `"openai-compat"`).
    fn name(&self) -> &str;

    /// Maximum number of tokens the model can accept as input.
    fn max_context_tokens(&self) -> usize;

    /// Maximum number of tokens the model can generate.
    fn max_output_tokens(&self) -> usize {
        4096
    }

    /// Estimate the total token count for the given conversation.
    fn count_tokens(&self, messages: &[Message], tools: Option<&[Value]>) -> usize;

    /// Start a streaming chat completion.
    ///
    /// `timeout` bounds each chunk read. The returned stream yields
    /// [`StreamChunk`]s; the last one has `done = true`.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        timeout: Duration,
    ) -> LlmResult<ChunkStream>;
}
