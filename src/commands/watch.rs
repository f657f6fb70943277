//! Watch command - follow a run until it reaches a final status.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::api::client::ReviewClient;
use crate::config::AppConfig;
use crate::history::RecentRuns;
use crate::poll::session::RunSession;
use crate::poll::SessionPhase;
use crate::render;
use crate::shutdown::wait_for_shutdown;

/// Arguments for the watch command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Run ID to watch
    pub run_id: String,
}

/// Execute the watch command.
pub async fn execute(args: WatchArgs, config: &AppConfig) -> Result<()> {
    let client = super::client(config)?;
    watch_to_completion(client, config, &args.run_id).await
}

/// Drives a poll session for one run and renders what it publishes. The
/// final report and the refreshed history print once the run finishes;
/// a timeout or poll failure propagates as this command's error after
/// showing the last status the service reported.
pub(crate) async fn watch_to_completion(
    client: Arc<ReviewClient>,
    config: &AppConfig,
    run_id: &str,
) -> Result<()> {
    let recent = Arc::new(RecentRuns::new(Arc::clone(&client), config.history.limit));
    let session = RunSession::new(client, Some(recent.clone()), config.poll_config()?);

    let mut view_rx = session.subscribe();
    session.start(run_id);
    println!("Watching {run_id} (Ctrl-C stops watching)");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                session.cancel();
                println!("Stopped watching {run_id}.");
                return Ok(());
            }
            changed = view_rx.changed() => {
                if changed.is_err() {
                    anyhow::bail!("status watcher went away unexpectedly");
                }
            }
        }

        let view = view_rx.borrow_and_update().clone();
        if view.polling {
            if let Some(status) = view.latest.as_ref() {
                let line = format!("{} is {}", status.run_id, status.state.as_str());
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            continue;
        }

        match session.phase() {
            SessionPhase::Terminal(_) => {
                // Wait out the reconcile step so the history below is fresh.
                session.join().await;
                if let Some(status) = view.latest.as_ref() {
                    println!();
                    super::print_lines(&render::run_report(status));
                }
                println!();
                println!("Recent runs");
                super::print_lines(&render::history_table(&recent.current()));
                return Ok(());
            }
            SessionPhase::TimedOut | SessionPhase::Errored => {
                session.join().await;
                if let Some(status) = view.latest.as_ref() {
                    println!();
                    println!("Last status before giving up:");
                    super::print_lines(&render::status_card(status));
                }
                match view.error {
                    Some(err) => return Err(err.into()),
                    None => anyhow::bail!("polling halted without a reported error"),
                }
            }
            SessionPhase::Idle | SessionPhase::Polling => {}
        }
    }
}
