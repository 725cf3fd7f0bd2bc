// Error types for pic-prompt
// Author: kelexine (https://github.com/kelexine)

use crate::providers::Provider;
use std::fmt;
use thiserror::Error;

/// Pipeline stage at which an image failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    /// Host could not be reached (DNS, connection refused, TLS).
    Unreachable,
    /// Request or body read exceeded the configured timeout.
    Timeout,
    /// Remote answered with a non-2xx status.
    HttpStatus,
    /// Declared content type is not an image.
    ContentType,
    /// Payload is larger than the configured download limit.
    Oversize,
    /// Local file or inline payload could not be read.
    Read,
    /// Bytes are not a recognizable/decodable image.
    Decode,
    /// Re-encoding or resizing failed.
    Transcode,
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageStage::Unreachable => "unreachable",
            ImageStage::Timeout => "timeout",
            ImageStage::HttpStatus => "http_status",
            ImageStage::ContentType => "content_type",
            ImageStage::Oversize => "oversize",
            ImageStage::Read => "read",
            ImageStage::Decode => "decode",
            ImageStage::Transcode => "transcode",
        };
        f.write_str(name)
    }
}

/// Renders the optional message index for error displays.
struct AtMessage<'a>(&'a Option<usize>);

impl fmt::Display for AtMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            Some(index) => write!(f, " (message {})", index),
            None => Ok(()),
        }
    }
}

/// Renders the optional provider name for error displays.
struct ForProvider<'a>(&'a Option<Provider>);

impl fmt::Display for ForProvider<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(provider) => write!(f, " ({})", provider),
            None => Ok(()),
        }
    }
}

// Clone is required: one failed fetch is delivered to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PicPromptError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Image processing error for {source_ref} at {stage}{}: {reason}", AtMessage(.message_index))]
    ImageProcessing {
        source_ref: String,
        stage: ImageStage,
        reason: String,
        message_index: Option<usize>,
    },

    #[error("Provider error{}{}: {reason}", ForProvider(.provider), AtMessage(.message_index))]
    Provider {
        provider: Option<Provider>,
        source_ref: Option<String>,
        reason: String,
        message_index: Option<usize>,
    },

    #[error("Prompt builder error: {0}")]
    PromptBuilder(String),
}

impl PicPromptError {
    /// Image failure for `source` at `stage`.
    pub fn image(source: impl Into<String>, stage: ImageStage, reason: impl Into<String>) -> Self {
        PicPromptError::ImageProcessing {
            source_ref: source.into(),
            stage,
            reason: reason.into(),
            message_index: None,
        }
    }

    /// Provider constraint failure, optionally tied to an image source.
    ///
    /// The provider itself is attached later with [`PicPromptError::with_provider`]
    /// since image-level checks only see the [`ImageConfig`](crate::config::ImageConfig).
    pub fn provider(source: Option<&str>, reason: impl Into<String>) -> Self {
        PicPromptError::Provider {
            provider: None,
            source_ref: source.map(str::to_string),
            reason: reason.into(),
            message_index: None,
        }
    }

    /// Attach the index of the message being built when the failure happened.
    pub fn with_message_index(self, index: usize) -> Self {
        match self {
            PicPromptError::ImageProcessing {
                source_ref,
                stage,
                reason,
                ..
            } => PicPromptError::ImageProcessing {
                source_ref,
                stage,
                reason,
                message_index: Some(index),
            },
            PicPromptError::Provider {
                provider,
                source_ref,
                reason,
                ..
            } => PicPromptError::Provider {
                provider,
                source_ref,
                reason,
                message_index: Some(index),
            },
            other => other,
        }
    }

    /// Attach the target provider to a provider constraint failure.
    pub fn with_provider(self, target: Provider) -> Self {
        match self {
            PicPromptError::Provider {
                source_ref,
                reason,
                message_index,
                ..
            } => PicPromptError::Provider {
                provider: Some(target),
                source_ref,
                reason,
                message_index,
            },
            other => other,
        }
    }

    /// Image source this error is attached to, if any.
    pub fn source_ref(&self) -> Option<&str> {
        match self {
            PicPromptError::ImageProcessing { source_ref, .. } => Some(source_ref),
            PicPromptError::Provider { source_ref, .. } => source_ref.as_deref(),
            _ => None,
        }
    }

    /// Message index attached by the builder, if any.
    pub fn message_index(&self) -> Option<usize> {
        match self {
            PicPromptError::ImageProcessing { message_index, .. }
            | PicPromptError::Provider { message_index, .. } => *message_index,
            _ => None,
        }
    }

    /// Short machine-readable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PicPromptError::Configuration(_) => "configuration_error",
            PicPromptError::ImageProcessing { .. } => "image_processing_error",
            PicPromptError::Provider { .. } => "provider_error",
            PicPromptError::PromptBuilder(_) => "prompt_builder_error",
        }
    }
}

impl From<config::ConfigError> for PicPromptError {
    fn from(err: config::ConfigError) -> Self {
        PicPromptError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PicPromptError>;
