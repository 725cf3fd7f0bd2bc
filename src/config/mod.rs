// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;
mod prompt;

pub use models::*;
pub use prompt::{ImageConfig, ImageEncoding, PromptConfig};

use crate::error::{PicPromptError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Same layering as [`AppConfig::load`], reading the file at `path`.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // Load from config file if it exists
            .add_source(File::with_name(path).required(false))
            // Override with environment variables (prefix: PIC_PROMPT_, nested with __)
            .add_source(
                Environment::with_prefix("PIC_PROMPT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| PicPromptError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PicPromptError::Configuration(e.to_string()))
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pic-prompt")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.downloader.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.downloader.timeout_seconds, 30);
        assert_eq!(config.defaults.provider, "openai");
        assert!(config.logging.sanitize_sources);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[downloader]\nmax_bytes = 1024\n\n[defaults]\nprovider = \"anthropic\""
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.downloader.max_bytes, 1024);
        assert_eq!(config.downloader.timeout_seconds, 30);
        assert_eq!(config.defaults.provider, "anthropic");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/pic-prompt/config.toml").unwrap();
        assert_eq!(config.logging.level, "warn");
    }
}
