//! OpenTelemetry GenAI operation names used as `gen_ai.operation.name`
//! values.
//!
//! Attribute keys are spelled inline in the span macros, which only accept
//! literal field names.

/// One-shot backstory generation.
pub const OP_GENERATE_BACKSTORY: &str = "generate_backstory";
