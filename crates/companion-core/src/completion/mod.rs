//! Completion service abstractions.
//!
//! - `CompletionService`: RPITIT trait for concrete backends
//! - `BoxCompletionService`: object-safe wrapper for dynamic dispatch
//! - `stream_with_span`: opens a stream inside a GenAI tracing span

pub mod box_service;
pub mod instrumented;
pub mod service;

pub use box_service::BoxCompletionService;
pub use instrumented::stream_with_span;
pub use service::{CompletionService, EventStream};
