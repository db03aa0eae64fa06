//! Intimacy scoring.

pub mod engine;

pub use engine::{BumpPolicy, apply, apply_existing};
