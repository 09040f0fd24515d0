//! CLI command implementations.

pub mod config;
pub mod configure;
pub mod generate;
pub mod limit;
pub mod providers;
pub mod stats;

use std::sync::Arc;

use anyhow::Result;
use nexo_manager::{AppContext, ProviderManager};
use nexo_providers::ProviderRegistry;
use nexo_store::KeySource;
use tracing::debug;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Context from the environment, with `--keychain` applied.
pub fn app_context(cli: &Cli) -> AppContext {
    let ctx = AppContext::from_env();
    if cli.keychain {
        ctx.with_key_source(KeySource::keychain())
    } else {
        ctx
    }
}

/// Opens the manager with every built-in provider registered and the
/// stored configuration applied.
pub async fn open_manager(cli: &Cli) -> Result<Arc<ProviderManager>> {
    let ctx = app_context(cli);
    debug!(
        data_dir = %ctx.paths.data_dir().display(),
        key_source = %ctx.key_source,
        "Opening manager"
    );

    let manager = ProviderManager::open(&ctx).await?;
    manager.initialize(ProviderRegistry::registrations()).await;
    manager.load_configuration().await?;
    Ok(manager)
}

/// Flushes ledgers and stops background work.
pub async fn close_manager(manager: &ProviderManager) -> Result<()> {
    manager.shutdown().await?;
    Ok(())
}

/// Text formatter honouring `--no-color`.
pub fn text_formatter(cli: &Cli) -> TextFormatter {
    TextFormatter::new(!cli.no_color)
}

/// Prints `data` as JSON when requested, otherwise the text rendering.
pub fn emit<T: serde::Serialize>(cli: &Cli, data: &T, text: impl FnOnce() -> String) -> Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(data)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}
