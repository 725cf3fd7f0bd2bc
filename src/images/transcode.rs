// Image validation, downscaling and re-encoding
// Author: kelexine (https://github.com/kelexine)

use super::formats::ImageFormat;
use crate::config::ImageConfig;
use crate::error::{ImageStage, PicPromptError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Each pass of the byte-budget loop shrinks both edges by this factor.
const SHRINK_FACTOR: f64 = 0.75;

/// The byte-budget loop gives up once the longest edge would drop below this.
const MIN_EDGE: u32 = 16;

/// Image bytes that satisfy an [`ImageConfig`].
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    /// Pixel size, when the format can be inspected.
    pub dimensions: Option<(u32, u32)>,
    /// False when the original bytes were passed through untouched.
    pub transcoded: bool,
}

/// Read pixel dimensions from the image header without decoding pixels.
///
/// Returns `Ok(None)` for formats the pipeline cannot inspect (HEIC/HEIF).
pub fn probe_dimensions(
    source: &str,
    bytes: &[u8],
    format: ImageFormat,
) -> Result<Option<(u32, u32)>> {
    let Some(codec) = format.codec().filter(|c| c.reading_enabled()) else {
        return Ok(None);
    };

    ImageReader::with_format(Cursor::new(bytes), codec)
        .into_dimensions()
        .map(Some)
        .map_err(|e| {
            PicPromptError::image(
                source,
                ImageStage::Decode,
                format!("cannot read {} header: {}", format.mime_type(), e),
            )
        })
}

/// Bring `bytes` within the limits of `config`.
///
/// Accepted images within every limit pass through byte-for-byte. Everything
/// else is decoded, downscaled if allowed and re-encoded.
pub fn prepare(
    source: &str,
    bytes: &Bytes,
    mime_type: &str,
    config: &ImageConfig,
) -> Result<PreparedImage> {
    let format = ImageFormat::from_mime_type(mime_type);
    let dimensions = match format {
        Some(f) => probe_dimensions(source, bytes, f)?,
        None => None,
    };

    let accepted = config.accepts(mime_type);
    let fits = dimensions.map_or(true, |(w, h)| config.fits(w, h));
    let small_enough = bytes.len() <= config.max_bytes;

    if accepted && fits && small_enough {
        return Ok(PreparedImage {
            bytes: bytes.clone(),
            mime_type: format.map_or(mime_type, |f| f.mime_type()).to_string(),
            dimensions,
            transcoded: false,
        });
    }

    if let (Some((width, height)), false) = (dimensions, fits) {
        if !config.allow_downscale {
            return Err(PicPromptError::provider(
                Some(source),
                format!(
                    "image is {}x{}, exceeding the {}x{} limit, and downscaling is disabled",
                    width, height, config.max_width, config.max_height
                ),
            ));
        }
    }

    let source_format = format.filter(|f| f.can_decode()).ok_or_else(|| {
        let reason = if accepted {
            format!(
                "{} image of {} bytes exceeds the {} byte limit and cannot be re-encoded",
                mime_type,
                bytes.len(),
                config.max_bytes
            )
        } else {
            format!(
                "no transcoding path from {} to any of [{}]",
                mime_type,
                config.accepted_mime_types.join(", ")
            )
        };
        PicPromptError::provider(Some(source), reason)
    })?;

    let target = target_format(source_format, accepted, config).ok_or_else(|| {
        PicPromptError::provider(
            Some(source),
            format!(
                "no transcoding path from {} to any of [{}]",
                mime_type,
                config.accepted_mime_types.join(", ")
            ),
        )
    })?;

    let mut img = decode(source, bytes, source_format)?;

    if !fits {
        debug!(
            "Downscaling {}x{} image to fit {}x{}",
            img.width(),
            img.height(),
            config.max_width,
            config.max_height
        );
        img = img.resize(config.max_width, config.max_height, FilterType::Lanczos3);
    }

    let mut encoded = encode(source, &img, target)?;

    while encoded.len() > config.max_bytes {
        if !config.allow_downscale {
            return Err(PicPromptError::provider(
                Some(source),
                format!(
                    "encoded image is {} bytes, exceeding the {} byte limit, and downscaling is disabled",
                    encoded.len(),
                    config.max_bytes
                ),
            ));
        }

        let width = (img.width() as f64 * SHRINK_FACTOR) as u32;
        let height = (img.height() as f64 * SHRINK_FACTOR) as u32;
        if width.max(height) < MIN_EDGE || width == 0 || height == 0 {
            return Err(PicPromptError::provider(
                Some(source),
                format!(
                    "cannot shrink image below the {} byte limit",
                    config.max_bytes
                ),
            ));
        }

        debug!(
            "Encoded image is {} bytes (limit {}), shrinking to {}x{}",
            encoded.len(),
            config.max_bytes,
            width,
            height
        );
        img = img.resize_exact(width, height, FilterType::Lanczos3);
        encoded = encode(source, &img, target)?;
    }

    Ok(PreparedImage {
        bytes: Bytes::from(encoded),
        mime_type: target.mime_type().to_string(),
        dimensions: Some((img.width(), img.height())),
        transcoded: true,
    })
}

/// Keep the source format when the provider takes it, else the first accepted
/// format the encoder can produce.
fn target_format(
    source_format: ImageFormat,
    accepted: bool,
    config: &ImageConfig,
) -> Option<ImageFormat> {
    if accepted && source_format.can_encode() {
        return Some(source_format);
    }

    config
        .accepted_mime_types
        .iter()
        .filter_map(|m| ImageFormat::from_mime_type(m))
        .find(|f| f.can_encode())
}

fn decode(source: &str, bytes: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    let codec = format.codec().ok_or_else(|| {
        PicPromptError::image(
            source,
            ImageStage::Decode,
            format!("{} cannot be decoded", format.mime_type()),
        )
    })?;

    image::load_from_memory_with_format(bytes, codec).map_err(|e| {
        PicPromptError::image(
            source,
            ImageStage::Decode,
            format!("corrupt {} data: {}", format.mime_type(), e),
        )
    })
}

fn encode(source: &str, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let codec = format.codec().ok_or_else(|| {
        PicPromptError::image(
            source,
            ImageStage::Transcode,
            format!("{} cannot be encoded", format.mime_type()),
        )
    })?;

    let mut out = Cursor::new(Vec::new());
    let written = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, codec),
        ImageFormat::Png => img.write_to(&mut out, codec),
        _ => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut out, codec),
    };

    written.map_err(|e| {
        PicPromptError::image(
            source,
            ImageStage::Transcode,
            format!("failed to encode {}: {}", format.mime_type(), e),
        )
    })?;

    Ok(out.into_inner())
}
