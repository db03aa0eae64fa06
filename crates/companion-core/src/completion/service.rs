//! CompletionService trait definition.
//!
//! Uses RPITIT for `complete`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxCompletionService wrapper).

use std::pin::Pin;

use futures_util::Stream;

use companion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// Boxed stream of provider events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// A remote text-completion backend.
///
/// Implementations must report `LlmError::NotConfigured` when no credential
/// is available, without attempting a network call. Dropping the stream
/// returned by `stream` aborts the request.
///
/// Implementations live in companion-infra (e.g., `OpenAiCompletionService`).
pub trait CompletionService: Send + Sync {
    /// Human-readable backend name (e.g., "openai").
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    fn stream(&self, request: CompletionRequest) -> EventStream;
}
