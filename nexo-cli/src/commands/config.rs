//! Config command - export, import and locate the configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use nexo_manager::PRIVACY_FILTER_PREFERENCE;
use nexo_store::{load_json, save_json};
use serde_json::Value;
use tracing::info;

use super::{app_context, close_manager, emit, open_manager, text_formatter};
use crate::Cli;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the encrypted configuration document to a file.
    Export {
        /// Destination file.
        file: PathBuf,
    },

    /// Replace the configuration with an exported document.
    Import {
        /// Exported file.
        file: PathBuf,
    },

    /// Show configuration paths.
    Path,

    /// Turn prompt redaction on or off.
    Privacy {
        /// New state.
        state: Toggle,
    },
}

/// On/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Enabled.
    On,
    /// Disabled.
    Off,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Export { file } => export(file, cli).await,
        ConfigAction::Import { file } => import(file, cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Privacy { state } => set_privacy(*state, cli).await,
    }
}

async fn export(file: &Path, cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let document = manager.export_configuration().await;
    close_manager(&manager).await?;

    save_json(file, &document?)
        .await
        .with_context(|| format!("Failed to write {}", file.display()))?;
    info!(path = %file.display(), "Configuration exported");

    let data = serde_json::json!({ "exported": file });
    emit(cli, &data, || format!("Exported configuration to {}", file.display()))
}

async fn import(file: &Path, cli: &Cli) -> Result<()> {
    let document: Value = load_json(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let manager = open_manager(cli).await?;
    let result = manager.import_configuration(&document).await;
    let active = manager.active_provider().await;
    close_manager(&manager).await?;
    let backup = result?;

    let data = serde_json::json!({
        "imported": file,
        "backup": backup,
        "active_provider": active,
    });
    let formatter = text_formatter(cli);
    emit(cli, &data, || {
        formatter.format_import(&file.display().to_string(), &backup.display().to_string())
    })
}

fn show_paths(cli: &Cli) -> Result<()> {
    let ctx = app_context(cli);
    let paths = &ctx.paths;
    let data = serde_json::json!({
        "data_dir": paths.data_dir(),
        "config_file": paths.config_file(),
        "key": ctx.key_source.to_string(),
        "cost_data_file": paths.cost_data_file(),
        "cost_limits_file": paths.cost_limits_file(),
        "backup_dir": paths.backup_dir(),
    });

    emit(cli, &data, || {
        [
            ("Data directory", paths.data_dir().display().to_string()),
            ("Config file", paths.config_file().display().to_string()),
            ("Key", ctx.key_source.to_string()),
            ("Cost data", paths.cost_data_file().display().to_string()),
            ("Cost limits", paths.cost_limits_file().display().to_string()),
            ("Backups", paths.backup_dir().display().to_string()),
        ]
        .iter()
        .map(|(label, location)| format!("{:<16} {location}", format!("{label}:")))
        .collect::<Vec<_>>()
        .join("\n")
    })
}

async fn set_privacy(state: Toggle, cli: &Cli) -> Result<()> {
    let enabled = state == Toggle::On;
    let manager = open_manager(cli).await?;
    let result = manager
        .config_store()
        .set_preference(PRIVACY_FILTER_PREFERENCE, Value::Bool(enabled))
        .await;
    close_manager(&manager).await?;
    result?;

    let data = BTreeMap::from([(PRIVACY_FILTER_PREFERENCE, enabled)]);
    emit(cli, &data, || {
        format!("Privacy filter {}", if enabled { "enabled" } else { "disabled" })
    })
}
