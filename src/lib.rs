// pic-prompt - Multi-modal prompt builder for vision-capable LLM providers
// Author: kelexine (https://github.com/kelexine)

pub mod cli;
pub mod config;
pub mod error;
pub mod images;
pub mod metrics;
pub mod prompt;
pub mod providers;
pub mod utils;

pub use config::{ImageConfig, ImageEncoding, PromptConfig};
pub use error::{PicPromptError, Result};
pub use images::{ImageData, ImageDownloader, ImageFetcher, ImageRegistry};
pub use prompt::{ContentPart, MessageType, PicPrompt, PromptMessage, PromptPayload};
pub use providers::Provider;
