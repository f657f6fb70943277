//! CLI subcommands.

pub mod health;
pub mod history;
pub mod run;
pub mod watch;

use std::sync::Arc;

use crate::api::client::ReviewClient;
use crate::config::AppConfig;
use crate::error::Result;

/// API client wired from configuration, shared by every subcommand.
pub(crate) fn client(config: &AppConfig) -> Result<Arc<ReviewClient>> {
    Ok(Arc::new(ReviewClient::new(
        &config.api.base_url,
        config.request_timeout(),
    )?))
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
