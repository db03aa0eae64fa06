//! The reply exchange: pipeline, UI bridge, and diagnostics.

pub mod bridge;
pub mod diagnostics;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{StartOutcome, UiEventBridge};
pub use diagnostics::DiagnosticBus;
pub use pipeline::{
    ExchangeEvent, ExchangeHandle, ExchangeSummary, PipelineSettings, StreamingReplyPipeline,
};
