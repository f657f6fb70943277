pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::RunStatus;

/// Source of run status documents. The polling engine only ever talks to
/// this trait; `client::ReviewClient` is the HTTP implementation and tests
/// substitute scripted ones.
///
/// Implementations perform exactly one request per call and return either
/// a validated document or a typed error. They must not retry internally:
/// retry policy belongs to the caller.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetch the current status document for a run.
    async fn fetch_status(&self, run_id: &str) -> Result<RunStatus>;
}
