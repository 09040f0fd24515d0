//! Provider commands - list, inspect, activate and remove providers.

use anyhow::Result;
use nexo_manager::{ManagerError, ProviderStatus};
use serde::Serialize;
use tracing::info;

use super::{close_manager, emit, open_manager, text_formatter};
use crate::Cli;

#[derive(Debug, Serialize)]
struct ProviderList {
    active_provider: Option<String>,
    fallback_chain: Vec<String>,
    providers: Vec<ProviderStatus>,
}

/// Lists every registered provider.
pub async fn list(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let list = ProviderList {
        active_provider: manager.active_provider().await,
        fallback_chain: manager.fallback_chain().await,
        providers: manager.list_providers().await,
    };
    close_manager(&manager).await?;

    let formatter = text_formatter(cli);
    emit(cli, &list, || {
        let mut lines = vec![formatter.format_providers_header()];
        lines.extend(list.providers.iter().map(|s| formatter.format_provider_line(s)));
        lines.push(String::new());
        lines.push(formatter.format_chain(list.active_provider.as_deref(), &list.fallback_chain));
        lines.join("\n")
    })
}

/// Shows one provider in detail.
pub async fn status(name: &str, cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let status = manager.get_provider_status(name).await;
    close_manager(&manager).await?;

    let status = status.ok_or_else(|| ManagerError::ProviderNotFound(name.to_string()))?;
    let formatter = text_formatter(cli);
    emit(cli, &status, || formatter.format_status(&status))
}

/// Makes `name` the active provider.
pub async fn activate(name: &str, cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let result = manager.set_active_provider(name).await;
    let chain = manager.fallback_chain().await;
    close_manager(&manager).await?;
    result?;

    info!(provider = %name, "Active provider set");
    let formatter = text_formatter(cli);
    let data = serde_json::json!({ "active_provider": name, "fallback_chain": chain });
    emit(cli, &data, || formatter.format_chain(Some(name), &chain))
}

/// Clears the stored configuration for `name`.
pub async fn remove(name: &str, cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let result = manager.remove_provider_config(name).await;
    let active = manager.active_provider().await;
    close_manager(&manager).await?;
    let removed = result?;

    let data = serde_json::json!({
        "provider": name,
        "removed": removed,
        "active_provider": active,
    });
    emit(cli, &data, || {
        if removed {
            format!("Removed configuration for {name}")
        } else {
            format!("No stored configuration for {name}")
        }
    })
}
