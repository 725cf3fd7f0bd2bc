// CLI module for pic-prompt
// Author: kelexine (https://github.com/kelexine)

use crate::error::{PicPromptError, Result};
use crate::prompt::{ContentPart, MessageType, PicPrompt, PromptMessage};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// pic-prompt - Build multi-modal prompt payloads for vision LLM providers
#[derive(Parser, Debug, Default)]
#[command(name = "pic-prompt", version, about, long_about = None)]
pub struct Args {
    /// Target provider (openai, anthropic, gemini, mock)
    #[arg(long, env = "PIC_PROMPT_PROVIDER")]
    pub provider: Option<String>,

    /// Model name to include in the payload
    #[arg(long)]
    pub model: Option<String>,

    /// System instruction
    #[arg(long)]
    pub system: Option<String>,

    /// User message text (repeatable)
    #[arg(long)]
    pub user: Vec<String>,

    /// Image URL, file path or data URI attached to the last user message (repeatable)
    #[arg(long)]
    pub image: Vec<String>,

    /// Assistant reply appended after the user messages
    #[arg(long)]
    pub assistant: Option<String>,

    /// TOML prompt file; its messages come before any given on the command line
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Reject oversized images instead of downscaling them
    #[arg(long)]
    pub no_downscale: bool,

    /// Pretty-print the JSON payload
    #[arg(long)]
    pub pretty: bool,

    /// Print Prometheus metrics to stderr after building
    #[arg(long)]
    pub metrics: bool,
}

/// Prompt file layout.
///
/// ```toml
/// provider = "anthropic"
/// model = "claude-sonnet-4"
///
/// [[messages]]
/// role = "user"
/// content = [
///     { type = "text", text = "What is in this picture?" },
///     { type = "image", source = "https://example.com/cat.png" },
/// ]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptFile {
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

impl PromptFile {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| PicPromptError::Configuration(format!("invalid prompt file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PicPromptError::Configuration(format!(
                "failed to read prompt file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }
}

impl Args {
    /// Whether the command line itself carries any message content.
    pub fn has_messages(&self) -> bool {
        self.system.is_some()
            || !self.user.is_empty()
            || !self.image.is_empty()
            || self.assistant.is_some()
    }

    /// Append the messages given on the command line.
    ///
    /// Order: system, each `--user` text, then `--assistant`. Images attach to
    /// the last user message, or form their own user message when no text was
    /// given.
    pub fn apply_messages(&self, prompt: &mut PicPrompt) -> Result<()> {
        if let Some(system) = &self.system {
            prompt.add_system_message(system.as_str())?;
        }

        let images = self.image.iter().map(|s| ContentPart::image(s.as_str()));

        match self.user.split_last() {
            Some((last, rest)) => {
                for text in rest {
                    prompt.add_user_message(text.as_str())?;
                }
                let mut content = vec![ContentPart::text(last.as_str())];
                content.extend(images);
                prompt.add_message(MessageType::User, content)?;
            }
            None if !self.image.is_empty() => {
                prompt.add_message(MessageType::User, images.collect())?;
            }
            None => {}
        }

        if let Some(assistant) = &self.assistant {
            prompt.add_assistant_message(assistant.as_str())?;
        }

        Ok(())
    }
}
