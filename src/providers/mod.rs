//! Provider identities and their image capabilities.
//!
//! Every provider-specific decision (accepted formats, size limits, which
//! encodings the payload can carry) is read from a single capability table
//! instead of being branched on at call sites. Payload rendering lives in
//! [`format`].
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod format;

use crate::config::ImageEncoding;
use crate::error::{PicPromptError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Target LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    /// Provider-neutral shape, used for tests and dry runs.
    Mock,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Mock => "mock",
        }
    }

    /// Capability row for this provider.
    pub fn capabilities(&self) -> &'static ProviderCapabilities {
        // Every variant is inserted below; the fallback is unreachable in practice.
        get_capability_table()
            .get(self)
            .unwrap_or(&MOCK_CAPABILITIES)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PicPromptError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                PicPromptError::Configuration(format!(
                    "Unknown provider: {}. Supported providers: {}",
                    s,
                    Provider::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}

/// What a provider accepts for inline images.
#[derive(Debug, Clone)]
pub struct ProviderCapabilities {
    pub accepted_mime_types: &'static [&'static str],
    /// Maximum encoded image size in bytes.
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    /// Encodings the payload format can carry; the first is the default.
    pub encodings: &'static [ImageEncoding],
    pub images_in_system: bool,
}

impl ProviderCapabilities {
    pub fn default_encoding(&self) -> ImageEncoding {
        self.encodings.first().copied().unwrap_or(ImageEncoding::Base64)
    }

    pub fn supports_encoding(&self, encoding: ImageEncoding) -> bool {
        self.encodings.contains(&encoding)
    }
}

const MOCK_CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    accepted_mime_types: &["image/png", "image/jpeg", "image/gif", "image/webp"],
    max_bytes: 20 * 1024 * 1024,
    max_width: 8192,
    max_height: 8192,
    encodings: &[ImageEncoding::Base64, ImageEncoding::DataUrl],
    images_in_system: true,
};

static CAPABILITY_TABLE: OnceLock<HashMap<Provider, ProviderCapabilities>> = OnceLock::new();

fn get_capability_table() -> &'static HashMap<Provider, ProviderCapabilities> {
    CAPABILITY_TABLE.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert(
            Provider::OpenAi,
            ProviderCapabilities {
                accepted_mime_types: &["image/png", "image/jpeg", "image/gif", "image/webp"],
                max_bytes: 20 * 1024 * 1024,
                max_width: 2048,
                max_height: 2048,
                encodings: &[ImageEncoding::DataUrl, ImageEncoding::Url],
                images_in_system: false,
            },
        );

        m.insert(
            Provider::Anthropic,
            ProviderCapabilities {
                accepted_mime_types: &["image/jpeg", "image/png", "image/gif", "image/webp"],
                max_bytes: 5 * 1024 * 1024,
                max_width: 8000,
                max_height: 8000,
                encodings: &[ImageEncoding::Base64, ImageEncoding::Url],
                images_in_system: false,
            },
        );

        // HEIC/HEIF pass through untouched; they are never produced by transcoding.
        m.insert(
            Provider::Gemini,
            ProviderCapabilities {
                accepted_mime_types: &[
                    "image/png",
                    "image/jpeg",
                    "image/webp",
                    "image/heic",
                    "image/heif",
                ],
                max_bytes: 20 * 1024 * 1024,
                max_width: 3072,
                max_height: 3072,
                encodings: &[ImageEncoding::Base64, ImageEncoding::Url],
                images_in_system: true,
            },
        );

        m.insert(Provider::Mock, MOCK_CAPABILITIES);

        m
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_provider_has_capabilities() {
        for provider in Provider::ALL {
            let caps = provider.capabilities();
            assert!(!caps.accepted_mime_types.is_empty());
            assert!(!caps.encodings.is_empty());
            assert!(caps.max_bytes > 0);
        }
    }

    #[test]
    fn test_default_encodings() {
        assert_eq!(
            Provider::OpenAi.capabilities().default_encoding(),
            ImageEncoding::DataUrl
        );
        assert_eq!(
            Provider::Anthropic.capabilities().default_encoding(),
            ImageEncoding::Base64
        );
        assert!(!Provider::Anthropic
            .capabilities()
            .supports_encoding(ImageEncoding::DataUrl));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" Gemini ".parse::<Provider>().unwrap(), Provider::Gemini);
        assert!(matches!(
            "bedrock".parse::<Provider>(),
            Err(PicPromptError::Configuration(_))
        ));
    }
}
