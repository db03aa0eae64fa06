//! Conversation history persistence abstractions.

pub mod store;

pub use store::HistoryStore;
