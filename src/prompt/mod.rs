//! Prompt assembly.
//!
//! # Submodules
//!
//! - `message`: Message roles and content parts.
//! - `builder`: The [`PicPrompt`] builder and its [`PromptPayload`] output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod builder;
pub mod message;

pub use builder::{PicPrompt, PromptPayload};
pub use message::{ContentPart, MessageType, PromptMessage};
