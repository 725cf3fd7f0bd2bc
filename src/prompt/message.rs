// Prompt message types
// Author: kelexine (https://github.com/kelexine)

use crate::error::{PicPromptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    System,
    User,
    Assistant,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::System => "system",
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic piece of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Reference to an image by source (URL, path or `data:` URI).
    Image { source: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(source: impl Into<String>) -> Self {
        ContentPart::Image {
            source: source.into(),
        }
    }

    pub fn image_source(&self) -> Option<&str> {
        match self {
            ContentPart::Image { source } => Some(source),
            ContentPart::Text { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ContentPart::Text { text } if text.trim().is_empty() => Err(
                PicPromptError::PromptBuilder("text content must not be empty".to_string()),
            ),
            ContentPart::Image { source } if source.trim().is_empty() => Err(
                PicPromptError::PromptBuilder("image source must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    #[serde(rename = "role")]
    pub message_type: MessageType,
    pub content: Vec<ContentPart>,
}

impl PromptMessage {
    /// Build a message, rejecting empty content and blank parts.
    pub fn new(message_type: MessageType, content: Vec<ContentPart>) -> Result<Self> {
        let message = Self {
            message_type,
            content,
        };
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(PicPromptError::PromptBuilder(format!(
                "{} message has no content",
                self.message_type
            )));
        }
        self.content.iter().try_for_each(ContentPart::validate)
    }

    /// Image sources referenced by this message, in order.
    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(ContentPart::image_source)
    }

    pub fn has_images(&self) -> bool {
        self.image_sources().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_rejected() {
        let err = PromptMessage::new(MessageType::User, vec![]).unwrap_err();
        assert!(matches!(err, PicPromptError::PromptBuilder(_)));
    }

    #[test]
    fn test_blank_parts_rejected() {
        assert!(PromptMessage::new(MessageType::User, vec![ContentPart::text("  ")]).is_err());
        assert!(PromptMessage::new(MessageType::User, vec![ContentPart::image("")]).is_err());
    }

    #[test]
    fn test_image_sources_in_order() {
        let message = PromptMessage::new(
            MessageType::User,
            vec![
                ContentPart::image("b.png"),
                ContentPart::text("compare"),
                ContentPart::image("a.png"),
            ],
        )
        .unwrap();

        assert!(message.has_images());
        assert_eq!(message.image_sources().collect::<Vec<_>>(), vec!["b.png", "a.png"]);
    }

    #[test]
    fn test_serde_shape() {
        let message = PromptMessage::new(
            MessageType::Assistant,
            vec![ContentPart::text("hi"), ContentPart::image("a.png")],
        )
        .unwrap();

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "hi"},
                    {"type": "image", "source": "a.png"}
                ]
            })
        );
    }
}
