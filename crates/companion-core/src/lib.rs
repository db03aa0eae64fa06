//! Business logic and storage trait definitions for Companion.
//!
//! This crate defines the "ports" (store and service traits) that the
//! infrastructure layer implements, plus the streaming reply pipeline that
//! drives one exchange end to end. It depends only on `companion-types` --
//! never on `companion-infra` or any database/IO crate.

pub mod character;
pub mod chat;
pub mod completion;
pub mod history;
pub mod prompt;
pub mod relationship;
