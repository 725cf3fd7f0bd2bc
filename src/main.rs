// pic-prompt - Multi-modal prompt builder for vision-capable LLM providers
// Author: kelexine (https://github.com/kelexine)

use anyhow::{bail, Result};
use clap::Parser;
use pic_prompt::cli::{Args, PromptFile};
use pic_prompt::config::{AppConfig, PromptConfig};
use pic_prompt::images::ImageRegistry;
use pic_prompt::metrics;
use pic_prompt::prompt::PicPrompt;
use pic_prompt::providers::Provider;
use pic_prompt::utils::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = AppConfig::load()?;

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting pic-prompt v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Load the prompt file, if any
    let file = match &args.file {
        Some(path) => {
            info!("Loading prompt file {}", path.display());
            Some(PromptFile::load(path)?)
        }
        None => None,
    };

    if file.as_ref().map_or(true, |f| f.messages.is_empty()) && !args.has_messages() {
        bail!("nothing to build: pass --file or at least one of --system, --user, --image or --assistant");
    }

    // Phase 4: Resolve prompt configuration (CLI > prompt file > config defaults)
    let provider: Provider = args
        .provider
        .as_deref()
        .or_else(|| file.as_ref().and_then(|f| f.provider.as_deref()))
        .unwrap_or(config.defaults.provider.as_str())
        .parse()?;

    let mut prompt_config = PromptConfig::for_provider(provider);
    prompt_config.image.allow_downscale = config.defaults.allow_downscale && !args.no_downscale;
    if let Some(model) = args
        .model
        .as_deref()
        .or_else(|| file.as_ref().and_then(|f| f.model.as_deref()))
    {
        prompt_config = prompt_config.with_model(model);
    }

    // Phase 5: Assemble messages
    let registry = ImageRegistry::new(&config.downloader)?;
    let mut prompt = PicPrompt::new(prompt_config, registry)?;

    if let Some(file) = file {
        for message in file.messages {
            prompt.add_message(message.message_type, message.content)?;
        }
    }
    args.apply_messages(&mut prompt)?;

    // Phase 6: Resolve images concurrently, then build
    prompt.prefetch().await?;
    let payload = prompt.build().await?;

    if args.pretty {
        println!("{}", payload.to_json_pretty());
    } else {
        println!("{}", payload.to_json());
    }

    if args.metrics {
        eprintln!("{}", metrics::gather_metrics());
    }

    info!(
        "Done: {} messages, {} images",
        prompt.messages().len(),
        prompt.registry().len()
    );
    Ok(())
}
