use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lookout::commands;
use lookout::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "lookout",
    version,
    about = "Kicks off Terraform PR review runs and watches them to completion"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Kick off a review run and watch it to completion
    Run(commands::run::RunArgs),
    /// Watch an existing run until it finishes
    Watch(commands::watch::WatchArgs),
    /// List recent review runs
    History(commands::history::HistoryArgs),
    /// Probe the review service
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; diagnostics go to stderr so tables stay pipeable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::debug!(base_url = %config.api.base_url, "Configuration loaded");

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config).await,
        Commands::Watch(args) => commands::watch::execute(args, &config).await,
        Commands::History(args) => commands::history::execute(args, &config).await,
        Commands::Health => commands::health::execute(&config).await,
    }
}
