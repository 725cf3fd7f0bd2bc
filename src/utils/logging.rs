//! Structured logging and log-safe rendering of image sources.
//!
//! This module configures the `tracing` ecosystem for the application and
//! keeps signed URLs and inline image payloads out of log output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest prefix of a `data:` URI kept in logs.
const INLINE_PREVIEW: usize = 32;

static SANITIZE_SOURCES: AtomicBool = AtomicBool::new(true);

/// Initializes the global tracing subscriber for the application.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for machine ingestion.
/// - `pretty`: Human-readable, multi-line output.
/// - `compact` (default): Single-line output, suited to a CLI writing to stderr.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`. Logs go to stderr so payloads on stdout
/// stay machine-readable.
pub fn init(config: &LoggingConfig) -> Result<()> {
    SANITIZE_SOURCES.store(config.sanitize_sources, Ordering::Relaxed);

    // Configure filter from environment or config file
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Renders an image source reference for logging.
///
/// Query strings and fragments on URLs often carry signatures or access
/// tokens, and `data:` URIs carry the whole image. Both are cut down to a
/// `[REDACTED]` marker unless sanitization was turned off in `LoggingConfig`.
pub fn sanitize_source(source: &str) -> String {
    if !SANITIZE_SOURCES.load(Ordering::Relaxed) {
        return source.to_string();
    }

    if source.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        let preview: String = source.chars().take(INLINE_PREVIEW).collect();
        return format!("{}...[REDACTED {} bytes]", preview, source.len());
    }

    match source.find(['?', '#']) {
        Some(pos) => format!("{}?[REDACTED]", &source[..pos]),
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_signed_url() {
        let output = sanitize_source("https://bucket.s3.amazonaws.com/a.png?X-Amz-Signature=abc123");
        assert_eq!(output, "https://bucket.s3.amazonaws.com/a.png?[REDACTED]");
        assert!(!output.contains("abc123"));
    }

    #[test]
    fn test_sanitize_data_uri() {
        let payload = "A".repeat(4096);
        let source = format!("data:image/png;base64,{}", payload);
        let output = sanitize_source(&source);
        assert!(output.starts_with("data:image/png;base64,"));
        assert!(output.len() < 100);
    }

    #[test]
    fn test_plain_sources_untouched() {
        assert_eq!(sanitize_source("/tmp/cat.png"), "/tmp/cat.png");
        assert_eq!(sanitize_source("https://a.test/cat.png"), "https://a.test/cat.png");
    }
}
