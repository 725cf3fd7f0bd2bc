// Image data value object and per-config encodings
// Author: kelexine (https://github.com/kelexine)

use super::downloader::{FetchedImage, SourceKind};
use super::formats::ImageFormat;
use super::transcode::{self, probe_dimensions};
use crate::config::{ImageConfig, ImageEncoding};
use crate::error::{ImageStage, PicPromptError, Result};
use crate::metrics;
use base64::Engine;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// One image as it travels through the pipeline.
///
/// Created empty by the registry, populated once with the fetched bytes, then
/// encoded on demand for each [`ImageConfig`] it is built against. Encoded
/// variants are cached on the instance, so encoding the same image twice for
/// the same configuration is a map lookup.
#[derive(Debug)]
pub struct ImageData {
    source: String,
    raw: OnceLock<RawImage>,
    variants: RwLock<HashMap<String, Arc<EncodedImage>>>,
}

#[derive(Debug)]
struct RawImage {
    bytes: Bytes,
    mime_type: String,
}

/// Provider-ready representation of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoding actually used. A `Url` request that cannot be honored is
    /// carried as `Base64`.
    pub encoding: ImageEncoding,
    pub mime_type: String,
    /// Base64 data, a data URL or the passthrough URL, depending on `encoding`.
    pub data: String,
    pub dimensions: Option<(u32, u32)>,
}

impl EncodedImage {
    /// Whether `data` is a reference (URL) rather than inline image data.
    pub fn is_reference(&self) -> bool {
        self.encoding == ImageEncoding::Url
    }

    /// Bare base64 payload for inline encodings; the URL for references.
    pub fn base64_data(&self) -> &str {
        match self.encoding {
            ImageEncoding::DataUrl => self
                .data
                .split_once(";base64,")
                .map_or(self.data.as_str(), |(_, b64)| b64),
            ImageEncoding::Base64 | ImageEncoding::Url => &self.data,
        }
    }

    /// `data:` URL for inline encodings; the URL for references.
    pub fn url(&self) -> String {
        match self.encoding {
            ImageEncoding::Base64 => format!("data:{};base64,{}", self.mime_type, self.data),
            ImageEncoding::DataUrl | ImageEncoding::Url => self.data.clone(),
        }
    }
}

impl ImageData {
    /// Empty entry for `source`, waiting for its bytes.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            raw: OnceLock::new(),
            variants: RwLock::new(HashMap::new()),
        }
    }

    /// Entry for image bytes the caller already holds.
    pub fn from_bytes(
        source: impl Into<String>,
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Result<Self> {
        let data = Self::new(source);
        data.populate(FetchedImage {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        })?;
        Ok(data)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_fetched(&self) -> bool {
        self.raw.get().is_some()
    }

    pub fn raw_bytes(&self) -> Option<&Bytes> {
        self.raw.get().map(|r| &r.bytes)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.raw.get().map(|r| r.mime_type.as_str())
    }

    /// Store the fetched bytes. Fails if the bytes were already set.
    pub fn populate(&self, fetched: FetchedImage) -> Result<()> {
        // Magic bytes beat whatever the transport declared
        let mime_type = ImageFormat::detect(&fetched.bytes)
            .map(|f| f.mime_type().to_string())
            .unwrap_or(fetched.mime_type);

        self.raw
            .set(RawImage {
                bytes: fetched.bytes,
                mime_type,
            })
            .map_err(|_| {
                PicPromptError::image(
                    &self.source,
                    ImageStage::Read,
                    "image bytes were already populated",
                )
            })
    }

    fn raw(&self) -> Result<&RawImage> {
        self.raw.get().ok_or_else(|| {
            PicPromptError::image(&self.source, ImageStage::Read, "image has not been fetched")
        })
    }

    /// Pixel size of the original image, when the format can be inspected.
    pub fn dimensions(&self) -> Result<Option<(u32, u32)>> {
        let raw = self.raw()?;
        match ImageFormat::from_mime_type(&raw.mime_type) {
            Some(format) => probe_dimensions(&self.source, &raw.bytes, format),
            None => Ok(None),
        }
    }

    /// Number of cached encodings.
    pub fn variant_count(&self) -> usize {
        self.variants.read().len()
    }

    /// Representation of this image that satisfies `config`.
    ///
    /// Validates format and limits, transcodes or downscales when needed and
    /// caches the result under the config's key.
    pub fn encode_for(&self, config: &ImageConfig) -> Result<Arc<EncodedImage>> {
        let key = config.cache_key();

        if let Some(encoded) = self.variants.read().get(&key) {
            debug!("Encoding cache hit for {}", &key[..16]);
            metrics::record_transcode("cached");
            return Ok(encoded.clone());
        }

        let raw = self.raw()?;
        let prepared = transcode::prepare(&self.source, &raw.bytes, &raw.mime_type, config)?;
        metrics::record_transcode(if prepared.transcoded {
            "transcoded"
        } else {
            "passthrough"
        });

        // A reference only stands in for the image when the provider would
        // see exactly the bytes we validated.
        let passthrough = config.encoding == ImageEncoding::Url
            && !prepared.transcoded
            && SourceKind::of(&self.source) == SourceKind::Remote;

        let (encoding, data) = if passthrough {
            (ImageEncoding::Url, self.source.clone())
        } else {
            let inline = base64::engine::general_purpose::STANDARD.encode(&prepared.bytes);
            match config.encoding {
                ImageEncoding::DataUrl => (
                    ImageEncoding::DataUrl,
                    format!("data:{};base64,{}", prepared.mime_type, inline),
                ),
                ImageEncoding::Base64 | ImageEncoding::Url => (ImageEncoding::Base64, inline),
            }
        };

        let encoded = Arc::new(EncodedImage {
            encoding,
            mime_type: prepared.mime_type,
            data,
            dimensions: prepared.dimensions,
        });

        let mut variants = self.variants.write();
        Ok(variants.entry(key).or_insert(encoded).clone())
    }
}
