//! Limit command - set, clear or show a monthly spend limit.

use anyhow::{Result, bail};
use clap::Args;
use nexo_store::DEFAULT_ALERT_THRESHOLD;

use super::{close_manager, emit, open_manager, text_formatter};
use crate::Cli;

/// Arguments for the limit command.
#[derive(Args, Debug)]
pub struct LimitArgs {
    /// Provider name.
    pub name: String,

    /// Monthly limit in USD. Shows the current position when omitted.
    pub monthly: Option<f64>,

    /// Fraction of the limit at which alerts start.
    #[arg(long, short, default_value_t = DEFAULT_ALERT_THRESHOLD)]
    pub threshold: f64,

    /// Remove the limit instead of setting one.
    #[arg(long, conflicts_with = "monthly")]
    pub clear: bool,
}

/// Runs the limit command.
pub async fn run(args: &LimitArgs, cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let result = apply(&manager, args).await;
    let usage = manager.cost_tracker().get_usage_stats(&args.name).await;
    close_manager(&manager).await?;
    result?;

    let formatter = text_formatter(cli);
    emit(cli, &usage, || formatter.format_usage(&usage))
}

async fn apply(manager: &nexo_manager::ProviderManager, args: &LimitArgs) -> Result<()> {
    if args.clear {
        if !manager.cost_tracker().remove_cost_limit(&args.name).await? {
            bail!("No limit set for {}", args.name);
        }
        return Ok(());
    }
    if let Some(monthly) = args.monthly {
        manager
            .set_cost_limit(&args.name, monthly, args.threshold)
            .await?;
    }
    Ok(())
}
