use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::api::client::ReviewClient;
use crate::api::types::HistoryEntry;
use crate::error::Result;

/// Hook fired by a session when its run ends in a genuine terminal state
/// (completed or failed, never timed out or errored). The session invokes
/// it at most once per polling lifetime and swallows its errors, so an
/// implementation can't stall or poison the run view.
#[async_trait]
pub trait HistoryReconciler: Send + Sync {
    async fn on_run_terminal(&self, run_id: &str) -> Result<()>;
}

/// Recent-runs listing kept current against `GET /history`. Holds the
/// latest rows in a watch channel so render loops can observe updates
/// without re-fetching.
pub struct RecentRuns {
    client: Arc<ReviewClient>,
    limit: u32,
    entries: watch::Sender<Vec<HistoryEntry>>,
}

impl RecentRuns {
    pub fn new(client: Arc<ReviewClient>, limit: u32) -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self {
            client,
            limit,
            entries,
        }
    }

    /// Re-fetches the listing and publishes it.
    pub async fn refresh(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.client.history(self.limit).await?;
        tracing::debug!(rows = entries.len(), "Refreshed recent runs");
        self.entries.send_replace(entries.clone());
        Ok(entries)
    }

    pub fn current(&self) -> Vec<HistoryEntry> {
        self.entries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<HistoryEntry>> {
        self.entries.subscribe()
    }
}

#[async_trait]
impl HistoryReconciler for RecentRuns {
    async fn on_run_terminal(&self, run_id: &str) -> Result<()> {
        tracing::debug!(run_id = %run_id, "Reconciling recent runs after terminal state");
        self.refresh().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;

    async fn spawn_stub() -> String {
        let router = Router::new().route(
            "/history",
            get(|| async {
                Json(serde_json::json!([
                    {
                        "run_id": "run-2",
                        "commit_sha": "cafef00d",
                        "issues": 1,
                        "fails": 0,
                        "cost": 4.0,
                        "duration_ms": 800,
                        "created_at": "2025-06-02T08:00:00"
                    },
                    {
                        "run_id": "run-1",
                        "commit_sha": "deadbeef",
                        "issues": 3,
                        "fails": 2,
                        "cost": 11.5,
                        "duration_ms": 1900,
                        "created_at": "2025-06-01T10:20:30"
                    }
                ]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn recent_runs(base: &str) -> RecentRuns {
        let client = ReviewClient::new(base, Duration::from_secs(5)).unwrap();
        RecentRuns::new(Arc::new(client), 10)
    }

    #[tokio::test]
    async fn test_refresh_publishes_listing() {
        let base = spawn_stub().await;
        let runs = recent_runs(&base);
        assert!(runs.current().is_empty());

        let fetched = runs.refresh().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(runs.current()[0].run_id, "run-2");
    }

    #[tokio::test]
    async fn test_terminal_hook_refreshes_listing() {
        let base = spawn_stub().await;
        let runs = recent_runs(&base);
        let mut rx = runs.subscribe();

        runs.on_run_terminal("run-2").await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
    }
}
