//! Prompt and image configuration snapshots.
//!
//! These are plain values: the pipeline reads them and never mutates them.
//! A [`PromptConfig`] is normally derived from the provider capability table
//! with [`PromptConfig::for_provider`] and then tightened by the caller.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::{PicPromptError, Result};
use crate::providers::Provider;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How an image is carried inside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    /// Bare base64 data next to a media type.
    Base64,
    /// `data:<mime>;base64,<data>` URL.
    DataUrl,
    /// The original remote reference, passed through.
    Url,
}

/// Image constraints for one target provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub accepted_mime_types: Vec<String>,
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub encoding: ImageEncoding,
    /// Downscale images over the pixel or byte limits instead of rejecting them.
    #[serde(default = "default_true")]
    pub allow_downscale: bool,
}

impl ImageConfig {
    /// Constraints taken straight from the provider's capability row.
    pub fn for_provider(provider: Provider) -> Self {
        let caps = provider.capabilities();
        Self {
            accepted_mime_types: caps
                .accepted_mime_types
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_bytes: caps.max_bytes,
            max_width: caps.max_width,
            max_height: caps.max_height,
            encoding: caps.default_encoding(),
            allow_downscale: true,
        }
    }

    pub fn accepts(&self, mime_type: &str) -> bool {
        self.accepted_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }

    /// Stable key identifying this configuration, used to cache encoded variants.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}

/// Full configuration for one prompt build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub provider: Provider,
    /// Model name copied into the payload when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub image: ImageConfig,
}

impl PromptConfig {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model: None,
            image: ImageConfig::for_provider(provider),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_image_config(mut self, image: ImageConfig) -> Self {
        self.image = image;
        self
    }

    /// Check the configuration against the provider's capabilities.
    pub fn validate(&self) -> Result<()> {
        let caps = self.provider.capabilities();
        let image = &self.image;

        if image.accepted_mime_types.is_empty() {
            return Err(PicPromptError::Configuration(
                "image.accepted_mime_types must not be empty".to_string(),
            ));
        }

        if let Some(mime) = image
            .accepted_mime_types
            .iter()
            .find(|m| !caps.accepted_mime_types.iter().any(|c| c.eq_ignore_ascii_case(m)))
        {
            return Err(PicPromptError::Configuration(format!(
                "{} is not accepted by provider {}",
                mime, self.provider
            )));
        }

        if image.max_bytes == 0 || image.max_width == 0 || image.max_height == 0 {
            return Err(PicPromptError::Configuration(
                "image size limits must be greater than zero".to_string(),
            ));
        }

        if image.max_bytes > caps.max_bytes {
            return Err(PicPromptError::Configuration(format!(
                "image.max_bytes {} exceeds provider {} limit of {}",
                image.max_bytes, self.provider, caps.max_bytes
            )));
        }

        if image.max_width > caps.max_width || image.max_height > caps.max_height {
            return Err(PicPromptError::Configuration(format!(
                "image limits {}x{} exceed provider {} limit of {}x{}",
                image.max_width, image.max_height, self.provider, caps.max_width, caps.max_height
            )));
        }

        if !caps.supports_encoding(image.encoding) {
            return Err(PicPromptError::Configuration(format!(
                "provider {} does not support {:?} image encoding",
                self.provider, image.encoding
            )));
        }

        if matches!(&self.model, Some(m) if m.trim().is_empty()) {
            return Err(PicPromptError::Configuration(
                "model must not be blank when set".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}
