//! Observability for Companion: subscriber setup and GenAI operation names.

pub mod genai_attrs;
pub mod tracing_setup;
