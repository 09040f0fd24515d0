//! Generate command - send a prompt through the fallback chain.

use anyhow::{Context, Result, bail};
use clap::Args;
use nexo_core::GenerationOptions;
use tokio::io::AsyncReadExt;

use super::{close_manager, emit, open_manager, text_formatter};
use crate::Cli;

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Prompt text. Reads stdin when omitted or `-`.
    pub prompt: Option<String>,

    /// Model override for whichever provider serves the request.
    #[arg(long, short)]
    pub model: Option<String>,

    /// Upper bound on generated tokens.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// System instruction sent ahead of the prompt.
    #[arg(long)]
    pub system: Option<String>,

    /// Operation label used for cost accounting.
    #[arg(long, default_value = nexo_core::DEFAULT_OPERATION)]
    pub operation: String,
}

impl GenerateArgs {
    /// Builds request options from the flags.
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system_prompt: self.system.clone(),
            operation_type: self.operation.clone(),
            ..GenerationOptions::default()
        }
    }
}

/// Runs the generate command.
pub async fn run(args: &GenerateArgs, cli: &Cli) -> Result<()> {
    let prompt = match args.prompt.as_deref() {
        Some(p) if p != "-" => p.to_string(),
        _ => read_stdin().await?,
    };
    if prompt.trim().is_empty() {
        bail!("Prompt is empty");
    }

    let manager = open_manager(cli).await?;
    let result = manager.generate_suggestion(&prompt, &args.options()).await;
    close_manager(&manager).await?;
    let result = result?;

    if cli.quiet {
        println!("{}", result.suggestion.text);
        return Ok(());
    }

    let formatter = text_formatter(cli);
    emit(cli, &result, || formatter.format_suggestion(&result))
}

async fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("Failed to read prompt from stdin")?;
    Ok(buf)
}
