//! Stats command - spend and usage per provider.

use anyhow::Result;

use super::{close_manager, emit, open_manager, text_formatter};
use crate::Cli;

/// Runs the stats command.
pub async fn run(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli).await?;
    let stats = manager.get_stats().await;
    close_manager(&manager).await?;

    let formatter = text_formatter(cli);
    emit(cli, &stats, || formatter.format_stats(&stats))
}
