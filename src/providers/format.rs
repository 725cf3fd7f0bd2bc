//! Provider payload shapes.
//!
//! Each provider gets a small set of borrowed serde types mirroring its
//! request format. Rendering never touches the network or the registry: it
//! takes messages whose images are already encoded.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::Provider;
use crate::config::PromptConfig;
use crate::error::{PicPromptError, Result};
use crate::images::EncodedImage;
use crate::prompt::MessageType;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A content part with its image already resolved and encoded.
#[derive(Debug, Clone)]
pub enum ResolvedPart<'a> {
    Text(&'a str),
    Image(Arc<EncodedImage>),
}

/// A message ready for rendering.
#[derive(Debug, Clone)]
pub struct ResolvedMessage<'a> {
    pub message_type: MessageType,
    pub parts: Vec<ResolvedPart<'a>>,
}

/// Render resolved messages into the payload shape of `config.provider`.
pub fn render(config: &PromptConfig, messages: &[ResolvedMessage<'_>]) -> Result<Value> {
    let model = config.model.as_deref();

    let payload = match config.provider {
        Provider::OpenAi => serde_json::to_value(openai::Request {
            model,
            messages: messages.iter().map(openai::Message::from).collect(),
        }),
        Provider::Anthropic => serde_json::to_value(anthropic::Request {
            model,
            messages: messages.iter().map(anthropic::Message::from).collect(),
        }),
        Provider::Gemini => serde_json::to_value(gemini::Request {
            model,
            contents: messages.iter().map(gemini::Content::from).collect(),
        }),
        Provider::Mock => serde_json::to_value(mock::Request {
            model,
            messages: messages.iter().map(mock::Message::from).collect(),
        }),
    };

    payload.map_err(|e| {
        PicPromptError::PromptBuilder(format!("failed to serialize {} payload: {}", config.provider, e))
    })
}

mod openai {
    use super::*;

    #[derive(Serialize)]
    pub struct Request<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<&'a str>,
        pub messages: Vec<Message<'a>>,
    }

    #[derive(Serialize)]
    pub struct Message<'a> {
        pub role: &'static str,
        pub content: Vec<Part<'a>>,
    }

    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Part<'a> {
        Text { text: &'a str },
        ImageUrl { image_url: ImageUrl },
    }

    #[derive(Serialize)]
    pub struct ImageUrl {
        pub url: String,
    }

    impl<'a> From<&ResolvedMessage<'a>> for Message<'a> {
        fn from(message: &ResolvedMessage<'a>) -> Self {
            Self {
                role: message.message_type.as_str(),
                content: message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ResolvedPart::Text(text) => Part::Text { text: *text },
                        ResolvedPart::Image(image) => Part::ImageUrl {
                            image_url: ImageUrl { url: image.url() },
                        },
                    })
                    .collect(),
            }
        }
    }
}

mod anthropic {
    use super::*;

    #[derive(Serialize)]
    pub struct Request<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<&'a str>,
        pub messages: Vec<Message<'a>>,
    }

    #[derive(Serialize)]
    pub struct Message<'a> {
        pub role: &'static str,
        pub content: Vec<Block<'a>>,
    }

    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Block<'a> {
        Text { text: &'a str },
        Image { source: ImageSource },
    }

    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ImageSource {
        Base64 { media_type: String, data: String },
        Url { url: String },
    }

    impl<'a> From<&ResolvedMessage<'a>> for Message<'a> {
        fn from(message: &ResolvedMessage<'a>) -> Self {
            Self {
                role: message.message_type.as_str(),
                content: message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ResolvedPart::Text(text) => Block::Text { text: *text },
                        ResolvedPart::Image(image) if image.is_reference() => Block::Image {
                            source: ImageSource::Url {
                                url: image.data.clone(),
                            },
                        },
                        ResolvedPart::Image(image) => Block::Image {
                            source: ImageSource::Base64 {
                                media_type: image.mime_type.clone(),
                                data: image.base64_data().to_string(),
                            },
                        },
                    })
                    .collect(),
            }
        }
    }
}

mod gemini {
    use super::*;

    #[derive(Serialize)]
    pub struct Request<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<&'a str>,
        pub contents: Vec<Content<'a>>,
    }

    #[derive(Serialize)]
    pub struct Content<'a> {
        pub role: &'static str,
        pub parts: Vec<Part<'a>>,
    }

    #[derive(Serialize)]
    #[serde(untagged)]
    pub enum Part<'a> {
        Text { text: &'a str },
        InlineData { inline_data: InlineData },
        FileData { file_data: FileData },
    }

    #[derive(Serialize)]
    pub struct InlineData {
        pub mime_type: String,
        pub data: String,
    }

    #[derive(Serialize)]
    pub struct FileData {
        pub mime_type: String,
        pub file_uri: String,
    }

    impl<'a> From<&ResolvedMessage<'a>> for Content<'a> {
        fn from(message: &ResolvedMessage<'a>) -> Self {
            //  Map role: "assistant" → "model"
            let role = match message.message_type {
                MessageType::Assistant => "model",
                other => other.as_str(),
            };

            Self {
                role,
                parts: message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ResolvedPart::Text(text) => Part::Text { text: *text },
                        ResolvedPart::Image(image) if image.is_reference() => Part::FileData {
                            file_data: FileData {
                                mime_type: image.mime_type.clone(),
                                file_uri: image.data.clone(),
                            },
                        },
                        ResolvedPart::Image(image) => Part::InlineData {
                            inline_data: InlineData {
                                mime_type: image.mime_type.clone(),
                                data: image.base64_data().to_string(),
                            },
                        },
                    })
                    .collect(),
            }
        }
    }
}

mod mock {
    use super::*;

    #[derive(Serialize)]
    pub struct Request<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<&'a str>,
        pub messages: Vec<Message<'a>>,
    }

    #[derive(Serialize)]
    pub struct Message<'a> {
        pub role: &'static str,
        pub content: Vec<Part<'a>>,
    }

    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Part<'a> {
        Text { text: &'a str },
        Image { mime_type: String, data: String },
    }

    impl<'a> From<&ResolvedMessage<'a>> for Message<'a> {
        fn from(message: &ResolvedMessage<'a>) -> Self {
            Self {
                role: message.message_type.as_str(),
                content: message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ResolvedPart::Text(text) => Part::Text { text: *text },
                        ResolvedPart::Image(image) => Part::Image {
                            mime_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        },
                    })
                    .collect(),
            }
        }
    }
}
