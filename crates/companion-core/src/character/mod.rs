//! Character profile persistence abstractions.

pub mod repository;

pub use repository::CharacterRepository;
