//! BoxCompletionService -- object-safe dynamic dispatch wrapper for CompletionService.
//!
//! 1. Define an object-safe `CompletionServiceDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionServiceDyn` for all `T: CompletionService`
//! 3. `BoxCompletionService` wraps `Box<dyn CompletionServiceDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use companion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities,
};

use super::service::{CompletionService, EventStream};

/// Object-safe version of [`CompletionService`] with boxed futures.
pub trait CompletionServiceDyn: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

    fn stream_boxed(&self, request: CompletionRequest) -> EventStream;
}

impl<T: CompletionService> CompletionServiceDyn for T {
    fn name(&self) -> &str {
        CompletionService::name(self)
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        CompletionService::capabilities(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn stream_boxed(&self, request: CompletionRequest) -> EventStream {
        self.stream(request)
    }
}

/// Type-erased completion service, so the pipeline and the CLI can hold
/// whichever backend was configured at startup (or a scripted one in tests).
pub struct BoxCompletionService {
    inner: Box<dyn CompletionServiceDyn + Send + Sync>,
}

impl BoxCompletionService {
    pub fn new<T: CompletionService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    /// Send a completion request and receive the full response.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }

    /// Send a streaming completion request. Returns a stream of events.
    pub fn stream(&self, request: CompletionRequest) -> EventStream {
        self.inner.stream_boxed(request)
    }
}

impl std::fmt::Debug for BoxCompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxCompletionService")
            .field("name", &self.name())
            .finish()
    }
}
