// PicPrompt - multi-modal prompt builder
// Author: kelexine (https://github.com/kelexine)

use super::message::{ContentPart, MessageType, PromptMessage};
use crate::config::PromptConfig;
use crate::error::{PicPromptError, Result};
use crate::images::{EncodedImage, ImageRegistry};
use crate::metrics;
use crate::providers::format::{self, ResolvedMessage, ResolvedPart};
use crate::utils::logging::sanitize_source;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Provider-shaped payload produced by [`PicPrompt::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload(Value);

impl PromptPayload {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.to_json())
    }
}

/// Builds a multi-modal prompt for one provider.
///
/// Messages are stored as given. Image references are resolved lazily: adding
/// a message never fetches anything, and images are only resolved through the
/// shared [`ImageRegistry`] when [`build`](PicPrompt::build) (or the opt-in
/// [`prefetch`](PicPrompt::prefetch)) runs. Building is repeatable: with the
/// same messages, registry contents and config the output is identical.
#[derive(Debug, Clone)]
pub struct PicPrompt {
    messages: Vec<PromptMessage>,
    registry: ImageRegistry,
    config: PromptConfig,
}

impl PicPrompt {
    /// Create a builder. Fails with a configuration error before any network
    /// activity if `config` is invalid.
    pub fn new(config: PromptConfig, registry: ImageRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            messages: Vec::new(),
            registry,
            config,
        })
    }

    pub fn add_message(
        &mut self,
        message_type: MessageType,
        content: Vec<ContentPart>,
    ) -> Result<&mut Self> {
        let message = PromptMessage::new(message_type, content)?;
        self.messages.push(message);
        Ok(self)
    }

    pub fn add_system_message(&mut self, text: impl Into<String>) -> Result<&mut Self> {
        self.add_message(MessageType::System, vec![ContentPart::text(text)])
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) -> Result<&mut Self> {
        self.add_message(MessageType::User, vec![ContentPart::text(text)])
    }

    pub fn add_assistant_message(&mut self, text: impl Into<String>) -> Result<&mut Self> {
        self.add_message(MessageType::Assistant, vec![ContentPart::text(text)])
    }

    /// User message carrying a single image.
    pub fn add_image_message(&mut self, source: impl Into<String>) -> Result<&mut Self> {
        self.add_message(MessageType::User, vec![ContentPart::image(source)])
    }

    /// User message with text followed by images, in the given order.
    pub fn add_user_message_with_images<I, S>(
        &mut self,
        text: impl Into<String>,
        sources: I,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut content = vec![ContentPart::text(text)];
        content.extend(sources.into_iter().map(ContentPart::image));
        self.add_message(MessageType::User, content)
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Unique image sources, in first-seen order.
    pub fn image_sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.messages
            .iter()
            .flat_map(|m| m.image_sources())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Resolve every referenced image concurrently, ahead of `build`.
    ///
    /// Optional: surfaces broken images early and warms the registry. Reports
    /// the first failure in source order.
    pub async fn prefetch(&self) -> Result<()> {
        let sources = self.image_sources();
        debug!("Prefetching {} images", sources.len());

        let results =
            futures::future::join_all(sources.iter().map(|s| self.registry.resolve(s))).await;

        results.into_iter().try_for_each(|r| r.map(|_| ()))
    }

    /// Resolve, encode and render every message into the provider payload.
    ///
    /// Fails on the first error; no partial payload is returned. Image errors
    /// carry the index of the message and the offending source.
    pub async fn build(&self) -> Result<PromptPayload> {
        let started = Instant::now();
        let provider = self.config.provider;

        let result = self.build_inner().await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => {
                info!(
                    "Built {} prompt with {} messages in {:.3}s",
                    provider,
                    self.messages.len(),
                    elapsed
                );
                metrics::record_build(provider.as_str(), "success", elapsed);
            }
            Err(e) => {
                warn!("Failed to build {} prompt: {}", provider, e);
                metrics::record_build(provider.as_str(), e.kind(), elapsed);
            }
        }

        result.map(PromptPayload)
    }

    async fn build_inner(&self) -> Result<Value> {
        self.config.validate()?;

        if self.messages.is_empty() {
            return Err(PicPromptError::PromptBuilder(
                "cannot build a prompt without messages".to_string(),
            ));
        }

        self.check_system_images()?;

        let mut resolved = Vec::with_capacity(self.messages.len());

        for (index, message) in self.messages.iter().enumerate() {
            let mut parts = Vec::with_capacity(message.content.len());

            for part in &message.content {
                match part {
                    ContentPart::Text { text } => parts.push(ResolvedPart::Text(text)),
                    ContentPart::Image { source } => {
                        let encoded = self
                            .encode_image(source)
                            .await
                            .map_err(|e| {
                                e.with_provider(self.config.provider)
                                    .with_message_index(index)
                            })?;
                        parts.push(ResolvedPart::Image(encoded));
                    }
                }
            }

            resolved.push(ResolvedMessage {
                message_type: message.message_type,
                parts,
            });
        }

        format::render(&self.config, &resolved)
    }

    /// Reject system-message images up front, before anything is fetched.
    fn check_system_images(&self) -> Result<()> {
        if self.config.provider.capabilities().images_in_system {
            return Ok(());
        }

        let offending = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.message_type == MessageType::System)
            .find_map(|(index, m)| m.image_sources().next().map(|s| (index, s)));

        match offending {
            Some((index, source)) => Err(PicPromptError::provider(
                Some(source),
                "images are not allowed in system messages",
            )
            .with_provider(self.config.provider)
            .with_message_index(index)),
            None => Ok(()),
        }
    }

    async fn encode_image(&self, source: &str) -> Result<Arc<EncodedImage>> {
        let data = self.registry.resolve(source).await?;
        let image_config = self.config.image.clone();

        debug!("Encoding {} for {}", sanitize_source(source), self.config.provider);

        // Decoding and resizing are CPU-bound; keep them off the async workers
        let encoded = tokio::task::spawn_blocking(move || data.encode_for(&image_config)).await;

        encoded.unwrap_or_else(|e| {
            Err(PicPromptError::image(
                source,
                crate::error::ImageStage::Transcode,
                format!("encoding task did not complete: {}", e),
            ))
        })
    }
}
