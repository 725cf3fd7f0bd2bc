//! Configuration data structures for pic-prompt.
//!
//! This module defines the schema for application settings: the image
//! downloader, logging, and the defaults used by the command-line tool.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Image downloader settings (timeouts, size cap).
    #[serde(default)]
    pub downloader: DownloaderConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults applied when a prompt does not specify them.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Settings for fetching image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Whole-request timeout in seconds.
    /// Default: `30`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// TCP connect timeout in seconds.
    /// Default: `10`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Largest payload accepted from any source, in bytes.
    /// Default: `20971520` (20MB)
    #[serde(default = "default_max_download_bytes")]
    pub max_bytes: usize,

    /// `User-Agent` header sent with remote fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `compact`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to strip query strings and inline payloads from logged sources.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub sanitize_sources: bool,
}

/// Defaults for prompts built by the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider used when `--provider` is not given.
    /// Default: `openai`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Whether oversized images are downscaled rather than rejected.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub allow_downscale: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_bytes: default_max_download_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sanitize_sources: true,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            allow_downscale: true,
        }
    }
}

// Helper functions for serde defaults
fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_download_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_user_agent() -> String {
    format!("pic-prompt/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}
