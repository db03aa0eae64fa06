//! Shared domain types for Companion.
//!
//! This crate contains the core domain types used across the companion:
//! character profiles, chat messages, session and relationship state,
//! LLM request/response shapes, UI events, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod character;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod relationship;
