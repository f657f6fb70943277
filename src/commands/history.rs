//! History command - list recent review runs.

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;
use crate::render;

/// Arguments for the history command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of runs to list (defaults to the configured limit)
    #[arg(long)]
    pub limit: Option<u32>,
}

/// Execute the history command.
pub async fn execute(args: HistoryArgs, config: &AppConfig) -> Result<()> {
    let client = super::client(config)?;
    let entries = client
        .history(args.limit.unwrap_or(config.history.limit))
        .await?;
    super::print_lines(&render::history_table(&entries));
    Ok(())
}
