//! Infrastructure layer for Companion.
//!
//! Implements the traits defined in `companion-core`: SQLite storage for
//! characters, messages and state records, an OpenAI-compatible completion
//! service, and the data directory, config and credential lookups the
//! binary wires together at startup.

pub mod config;
pub mod credentials;
pub mod filesystem;
pub mod llm;
pub mod sqlite;
