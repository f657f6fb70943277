//! Run command - kick off a review and follow it to a final status.

use anyhow::Result;
use clap::Args;

use crate::api::types::KickoffRequest;
use crate::config::AppConfig;
use crate::render;

/// Arguments for the run command. The defaults drive the service's bundled
/// sample pipeline, so a bare `lookout run` works against a fresh install.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Repository the pull request belongs to, as owner/name
    #[arg(long, default_value = "demo/terraform")]
    pub repo: String,

    /// Pull request number
    #[arg(long, default_value_t = 1)]
    pub pr_number: u64,

    /// Commit SHA under review
    #[arg(long, default_value = "deadbeef")]
    pub commit_sha: String,

    /// Terraform directory within the repository (the service falls back
    /// to its sample sources when omitted)
    #[arg(long)]
    pub tf_path: Option<String>,

    /// Print the run id and exit instead of watching the run
    #[arg(long)]
    pub no_watch: bool,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: &AppConfig) -> Result<()> {
    let client = super::client(config)?;
    let request = KickoffRequest {
        repo: args.repo,
        pr_number: args.pr_number,
        commit_sha: args.commit_sha,
        tf_path: args.tf_path,
    };

    tracing::info!(
        repo = %request.repo,
        pr = request.pr_number,
        commit = %request.commit_sha,
        "Kicking off review run"
    );
    let status = client.kickoff(&request).await?;
    println!("Run ID: {}", status.run_id);

    if status.state.is_terminal() {
        // Small changes are reviewed synchronously, so the kickoff reply
        // may already be final.
        println!();
        super::print_lines(&render::run_report(&status));
        return Ok(());
    }

    if args.no_watch {
        println!(
            "Run is {}. Follow it with `lookout watch {}`.",
            status.state.as_str(),
            status.run_id
        );
        return Ok(());
    }

    super::watch::watch_to_completion(client, config, &status.run_id).await
}
