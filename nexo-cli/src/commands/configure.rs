//! Configure command - store provider configuration fields.

use anyhow::{Result, bail};
use clap::Args;
use nexo_core::ProviderConfig;
use serde_json::Value;

use super::{close_manager, emit, open_manager, text_formatter};
use crate::Cli;

/// Arguments for the configure command.
#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Provider name.
    pub name: String,

    /// Field assignment `key=value`. Values are read as JSON when they
    /// parse (numbers, booleans), otherwise as plain strings.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Field to remove from the stored configuration.
    #[arg(long = "unset", value_name = "KEY")]
    pub unset: Vec<String>,
}

impl ConfigureArgs {
    /// Builds the config patch. Unset fields become `null`, which the
    /// store treats as removal.
    pub fn patch(&self) -> Result<ProviderConfig> {
        if self.set.is_empty() && self.unset.is_empty() {
            bail!("Nothing to configure; pass --set key=value or --unset key");
        }

        let mut config = ProviderConfig::new();
        for assignment in &self.set {
            let (key, value) = parse_assignment(assignment)?;
            config.set(key, value);
        }
        for key in &self.unset {
            config.set(key.clone(), Value::Null);
        }
        Ok(config)
    }
}

/// Splits `key=value` and types the value.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected key=value, got '{raw}'");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Empty key in '{raw}'");
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

/// Runs the configure command.
pub async fn run(args: &ConfigureArgs, cli: &Cli) -> Result<()> {
    let patch = args.patch()?;

    let manager = open_manager(cli).await?;
    let result = manager.configure_provider(&args.name, patch).await;
    let status = manager.get_provider_status(&args.name).await;
    close_manager(&manager).await?;
    result?;

    let formatter = text_formatter(cli);
    match status {
        Some(status) => emit(cli, &status, || formatter.format_status(&status)),
        None => Ok(()),
    }
}
