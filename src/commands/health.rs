//! Health command - probe the review service.

use anyhow::Result;

use crate::config::AppConfig;

/// Execute the health command. Exits non-zero when the service answers
/// but reports itself unhealthy.
pub async fn execute(config: &AppConfig) -> Result<()> {
    let client = super::client(config)?;
    let health = client.health().await?;

    println!("ok: {}", health.ok);
    if let Some(env) = health.env.as_deref() {
        println!("env: {env}");
    }
    if let Some(sync) = health.sync {
        println!("sync: {sync}");
    }

    if !health.ok {
        anyhow::bail!("service at {} reported unhealthy", config.api.base_url);
    }
    Ok(())
}
