//! System prompt and backstory text generation.

pub mod assembler;
pub mod backstory;

pub use assembler::{PromptAssembler, RelationshipStage};
pub use backstory::{Backstory, BackstoryGenerator, BackstorySource, render_offline_backstory};
