//! OpenAI SSE stream to [`StreamEvent`] adapter.

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};
use futures_util::StreamExt;

use companion_core::completion::EventStream;
use companion_types::llm::{LlmError, StopReason, StreamEvent, Usage};

pub(crate) fn stop_reason(finish: &FinishReason) -> StopReason {
    match finish {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::EndTurn,
    }
}

/// Map an async-openai chunk stream to provider-agnostic events.
///
/// Order: `Connected`, then `TextDelta` per non-empty content chunk,
/// `MessageDelta` when a finish reason arrives, `Usage` from the trailing
/// usage chunk, and finally `Done`.
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> EventStream {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut stream = stream;
        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;

            if let Some(usage) = chunk.usage.as_ref() {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta {
                        index: choice.index,
                        text: text.clone(),
                    };
                }
                if let Some(finish) = choice.finish_reason.as_ref() {
                    yield StreamEvent::MessageDelta {
                        stop_reason: stop_reason(finish),
                    };
                }
            }
        }

        yield StreamEvent::Done;
    })
}
