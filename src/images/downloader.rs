// Image downloader for remote, local and inline sources
// Author: kelexine (https://github.com/kelexine)

use super::formats::ImageFormat;
use crate::config::DownloaderConfig;
use crate::error::{ImageStage, PicPromptError, Result};
use crate::metrics;
use crate::utils::logging::sanitize_source;
use async_trait::async_trait;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Raw result of fetching one source.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// How a source reference is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `http://` or `https://` URL
    Remote,
    /// `data:` URI with a base64 payload
    Inline,
    /// Filesystem path, optionally prefixed with `file://`
    Local,
}

impl SourceKind {
    pub fn of(source: &str) -> Self {
        let lower = source.trim_start().get(..8).unwrap_or(source).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceKind::Remote
        } else if lower.starts_with("data:") {
            SourceKind::Inline
        } else {
            SourceKind::Local
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Remote => "remote",
            SourceKind::Inline => "inline",
            SourceKind::Local => "local",
        }
    }
}

/// Anything that can turn a source reference into image bytes.
///
/// The registry only talks to this trait, so tests and embedders can swap in
/// their own transport.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<FetchedImage>;
}

/// Default fetcher: HTTP(S) via reqwest, local files via tokio, `data:` URIs inline.
///
/// Every path enforces `max_bytes` before the payload is fully buffered.
/// There is no retry here; a failed fetch is reported once with its stage.
pub struct ImageDownloader {
    http_client: Client,
    max_bytes: usize,
}

impl ImageDownloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .build()
            .map_err(|e| {
                PicPromptError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        debug!(
            "Created image downloader (timeout {}s, max {} bytes)",
            config.timeout_seconds, config.max_bytes
        );

        Ok(Self {
            http_client,
            max_bytes: config.max_bytes,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn oversize(&self, source: &str, size: u64) -> PicPromptError {
        PicPromptError::image(
            source,
            ImageStage::Oversize,
            format!(
                "payload of {} bytes exceeds the {} byte limit",
                size, self.max_bytes
            ),
        )
    }

    async fn fetch_remote(&self, source: &str) -> Result<FetchedImage> {
        let response = self
            .http_client
            .get(source)
            .send()
            .await
            .map_err(|e| classify_request_error(source, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PicPromptError::image(
                source,
                ImageStage::HttpStatus,
                format!("HTTP {}", status),
            ));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase());

        if let Some(content_type) = &declared {
            if !content_type.starts_with("image/") && content_type != "application/octet-stream" {
                return Err(PicPromptError::image(
                    source,
                    ImageStage::ContentType,
                    format!("expected an image, got {}", content_type),
                ));
            }
        }

        // Reject early when the server announces the size
        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.oversize(source, length));
            }
        }

        let capacity = response
            .content_length()
            .map_or(0, |l| l as usize)
            .min(self.max_bytes);
        let mut body = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_request_error(source, &e))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.oversize(source, (body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        let bytes = body.freeze();
        let mime_type = resolve_mime_type(source, &bytes, declared.as_deref())?;
        Ok(FetchedImage { bytes, mime_type })
    }

    async fn fetch_local(&self, source: &str) -> Result<FetchedImage> {
        let path = source.strip_prefix("file://").unwrap_or(source);

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            PicPromptError::image(source, ImageStage::Read, format!("cannot stat file: {}", e))
        })?;

        if !metadata.is_file() {
            return Err(PicPromptError::image(
                source,
                ImageStage::Read,
                "not a regular file",
            ));
        }
        if metadata.len() > self.max_bytes as u64 {
            return Err(self.oversize(source, metadata.len()));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PicPromptError::image(source, ImageStage::Read, format!("cannot read file: {}", e))
        })?;

        // The file may have grown since the metadata check
        if bytes.len() > self.max_bytes {
            return Err(self.oversize(source, bytes.len() as u64));
        }

        let bytes = Bytes::from(bytes);
        let mime_type = resolve_mime_type(source, &bytes, None)?;
        Ok(FetchedImage { bytes, mime_type })
    }

    fn decode_inline(&self, source: &str) -> Result<FetchedImage> {
        let rest = &source.trim_start()["data:".len()..];
        let (meta, payload) = rest.split_once(',').ok_or_else(|| {
            PicPromptError::image(source, ImageStage::Read, "malformed data URI")
        })?;

        let declared = meta.strip_suffix(";base64").ok_or_else(|| {
            PicPromptError::image(source, ImageStage::Read, "data URI must be base64 encoded")
        })?;

        let estimated = (payload.len() as u64 / 4) * 3;
        if estimated > self.max_bytes as u64 {
            return Err(self.oversize(source, estimated));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| {
                PicPromptError::image(source, ImageStage::Read, format!("invalid base64: {}", e))
            })?;

        if bytes.len() > self.max_bytes {
            return Err(self.oversize(source, bytes.len() as u64));
        }

        let bytes = Bytes::from(bytes);
        let declared = Some(declared).filter(|d| !d.is_empty());
        let mime_type = resolve_mime_type(source, &bytes, declared)?;
        Ok(FetchedImage { bytes, mime_type })
    }
}

#[async_trait]
impl ImageFetcher for ImageDownloader {
    async fn fetch(&self, source: &str) -> Result<FetchedImage> {
        let kind = SourceKind::of(source);
        let started = Instant::now();
        debug!("Fetching {} image {}", kind.as_str(), sanitize_source(source));

        let result = match kind {
            SourceKind::Remote => self.fetch_remote(source).await,
            SourceKind::Local => self.fetch_local(source).await,
            SourceKind::Inline => self.decode_inline(source),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(fetched) => {
                debug!(
                    "Fetched {} ({} bytes, {}) in {:.3}s",
                    sanitize_source(source),
                    fetched.bytes.len(),
                    fetched.mime_type,
                    elapsed
                );
                metrics::record_fetch(kind.as_str(), "success", elapsed);
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", sanitize_source(source), e);
                metrics::record_fetch(kind.as_str(), "failure", elapsed);
            }
        }

        result
    }
}

fn classify_request_error(source: &str, err: &reqwest::Error) -> PicPromptError {
    let stage = if err.is_timeout() {
        ImageStage::Timeout
    } else if err.is_decode() || err.is_body() {
        ImageStage::Read
    } else {
        ImageStage::Unreachable
    };
    PicPromptError::image(source, stage, err.to_string())
}

/// Magic bytes first, then a declared `image/*` type, then the extension.
fn resolve_mime_type(source: &str, bytes: &[u8], declared: Option<&str>) -> Result<String> {
    if bytes.is_empty() {
        return Err(PicPromptError::image(source, ImageStage::Decode, "empty image payload"));
    }

    if let Some(format) = ImageFormat::detect(bytes) {
        return Ok(format.mime_type().to_string());
    }

    if let Some(mime) = declared.filter(|m| m.starts_with("image/")) {
        return Ok(mime.to_string());
    }

    ImageFormat::from_extension(source)
        .map(|f| f.mime_type().to_string())
        .ok_or_else(|| {
            PicPromptError::image(source, ImageStage::Decode, "unrecognized image data")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    fn downloader(max_bytes: usize) -> ImageDownloader {
        ImageDownloader::new(&DownloaderConfig {
            max_bytes,
            ..DownloaderConfig::default()
        })
        .unwrap()
    }

    fn stage_of(err: PicPromptError) -> ImageStage {
        match err {
            PicPromptError::ImageProcessing { stage, .. } => stage,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::of("https://a.test/x.png"), SourceKind::Remote);
        assert_eq!(SourceKind::of("HTTP://a.test/x.png"), SourceKind::Remote);
        assert_eq!(SourceKind::of("data:image/png;base64,AAAA"), SourceKind::Inline);
        assert_eq!(SourceKind::of("/tmp/x.png"), SourceKind::Local);
        assert_eq!(SourceKind::of("file:///tmp/x.png"), SourceKind::Local);
        assert_eq!(SourceKind::of("x.png"), SourceKind::Local);
    }

    #[test]
    fn test_inline_data_uri() {
        let source = format!("data:image/png;base64,{}", PNG_1X1);
        let fetched = tokio_test::block_on(downloader(1024).fetch(&source)).unwrap();
        assert_eq!(fetched.mime_type, "image/png");
        assert_eq!(fetched.bytes.len(), 70);
    }

    #[test]
    fn test_inline_oversize_rejected_before_decoding() {
        let source = format!("data:image/png;base64,{}", PNG_1X1);
        let err = tokio_test::block_on(downloader(16).fetch(&source)).unwrap_err();
        assert_eq!(stage_of(err), ImageStage::Oversize);
    }

    #[test]
    fn test_inline_requires_base64() {
        let err = tokio_test::block_on(downloader(1024).fetch("data:image/png,raw")).unwrap_err();
        assert_eq!(stage_of(err), ImageStage::Read);
    }

    #[test]
    fn test_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            &base64::engine::general_purpose::STANDARD
                .decode(PNG_1X1)
                .unwrap(),
        )
        .unwrap();
        let source = file.path().to_str().unwrap().to_string();

        let fetched = tokio_test::block_on(downloader(1024).fetch(&source)).unwrap();
        assert_eq!(fetched.mime_type, "image/png");

        let err = tokio_test::block_on(downloader(10).fetch(&source)).unwrap_err();
        assert_eq!(stage_of(err), ImageStage::Oversize);
    }

    #[test]
    fn test_missing_local_file() {
        let err = tokio_test::block_on(downloader(1024).fetch("/nonexistent/pic.png")).unwrap_err();
        assert_eq!(stage_of(err), ImageStage::Read);
    }

    #[test]
    fn test_resolve_mime_type_fallbacks() {
        assert_eq!(
            resolve_mime_type("x", b"\x89PNG\r\n\x1a\n....", Some("image/jpeg")).unwrap(),
            "image/png"
        );
        assert_eq!(
            resolve_mime_type("x", b"????", Some("image/heic")).unwrap(),
            "image/heic"
        );
        assert_eq!(resolve_mime_type("x.webp", b"????", None).unwrap(), "image/webp");
        assert!(resolve_mime_type("x", b"????", None).is_err());
        assert!(resolve_mime_type("x.png", b"", None).is_err());
    }
}
