// Error handling tests
// Author: kelexine (https://github.com/kelexine)

use pic_prompt::error::{ImageStage, PicPromptError};
use pic_prompt::providers::Provider;

#[test]
fn test_error_display_messages() {
    let errors = vec![
        PicPromptError::Configuration("max_bytes must be positive".to_string()),
        PicPromptError::image("a.png", ImageStage::Decode, "truncated"),
        PicPromptError::provider(Some("a.png"), "too large"),
        PicPromptError::provider(None, "unsupported"),
        PicPromptError::PromptBuilder("no messages".to_string()),
    ];

    for error in errors {
        let display = format!("{}", error);
        assert!(!display.is_empty(), "Error should have display message");
    }
}

#[test]
fn test_configuration_error() {
    let error = PicPromptError::Configuration("unknown provider: foo".to_string());
    assert_eq!(error.kind(), "configuration_error");
    assert!(format!("{}", error).contains("unknown provider: foo"));
}

#[test]
fn test_image_processing_error() {
    let error = PicPromptError::image("https://a.test/x.png", ImageStage::Timeout, "deadline")
        .with_message_index(3);

    let display = format!("{}", error);
    assert!(display.contains("https://a.test/x.png"));
    assert!(display.contains("timeout"));
    assert!(display.contains("message 3"));
    assert_eq!(error.kind(), "image_processing_error");
}

#[test]
fn test_provider_error_context() {
    let error = PicPromptError::provider(Some("a.png"), "format not accepted")
        .with_message_index(0)
        .with_provider(Provider::Gemini);

    assert_eq!(error.source_ref(), Some("a.png"));
    assert_eq!(error.message_index(), Some(0));
    assert!(format!("{}", error).contains("gemini"));
}

#[test]
fn test_context_only_applies_to_matching_variants() {
    let error = PicPromptError::Configuration("bad".to_string())
        .with_message_index(1)
        .with_provider(Provider::OpenAi);

    assert_eq!(error, PicPromptError::Configuration("bad".to_string()));
    assert_eq!(error.source_ref(), None);
}

#[test]
fn test_errors_are_cloneable() {
    let error = PicPromptError::image("a.png", ImageStage::Unreachable, "refused");
    let copy = error.clone();
    assert_eq!(error, copy);
}

#[test]
fn test_config_error_conversion() {
    let err: PicPromptError = config::ConfigError::Message("broken".to_string()).into();
    assert!(matches!(err, PicPromptError::Configuration(msg) if msg.contains("broken")));
}
