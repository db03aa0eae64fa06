//! Stream wrapper that keeps a tracing span entered while the stream is polled.
//!
//! Without this, the span opened around a streaming request would close as
//! soon as the stream is created, long before the reply finishes.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;

use companion_types::llm::{CompletionRequest, LlmError, StreamEvent};

use super::box_service::BoxCompletionService;
use super::service::EventStream;

pin_project! {
    pub struct StreamInSpan<S> {
        #[pin]
        inner: S,
        span: tracing::Span,
    }
}

impl<S> StreamInSpan<S> {
    pub fn new(inner: S, span: tracing::Span) -> Self {
        Self { inner, span }
    }
}

impl<S> Stream for StreamInSpan<S>
where
    S: Stream<Item = Result<StreamEvent, LlmError>>,
{
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        let poll = this.inner.poll_next(cx);
        match &poll {
            Poll::Ready(Some(Ok(StreamEvent::Usage(usage)))) => {
                this.span.record("gen_ai.usage.input_tokens", usage.input_tokens);
                this.span.record("gen_ai.usage.output_tokens", usage.output_tokens);
            }
            Poll::Ready(Some(Ok(StreamEvent::MessageDelta { stop_reason }))) => {
                this.span
                    .record("gen_ai.response.finish_reasons", tracing::field::display(stop_reason));
            }
            _ => {}
        }
        poll
    }
}

/// Open a streaming request wrapped in a `gen_ai.chat` span.
pub fn stream_with_span(service: &BoxCompletionService, request: CompletionRequest) -> EventStream {
    let span = tracing::info_span!(
        "gen_ai.chat",
        gen_ai.operation.name = "chat",
        gen_ai.provider.name = service.name(),
        gen_ai.request.model = %request.model,
        gen_ai.request.max_tokens = request.max_tokens,
        gen_ai.request.temperature = ?request.temperature,
        gen_ai.request.stream = true,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
        gen_ai.response.finish_reasons = tracing::field::Empty,
    );
    let inner = service.stream(request);
    Box::pin(StreamInSpan::new(inner, span))
}
