pub mod scheduler;
pub mod session;

use std::time::Duration;

use crate::api::types::{RunState, RunStatus};
use crate::error::{AppError, Result};

/// Cadence and ceiling for one polling lifetime. Both knobs must be
/// strictly positive.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(AppError::Config("poll interval must be positive".to_string()));
        }
        if timeout.is_zero() {
            return Err(AppError::Config("poll timeout must be positive".to_string()));
        }
        Ok(Self { interval, timeout })
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1_000),
            timeout: Duration::from_millis(120_000),
        }
    }
}

/// Where a session currently stands. The right-hand states are halted:
/// the engine stops on its own and only `start` or `refresh` leave them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Polling,
    Terminal(RunState),
    TimedOut,
    Errored,
}

impl SessionPhase {
    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            SessionPhase::Terminal(_) | SessionPhase::TimedOut | SessionPhase::Errored
        )
    }
}

/// Observable session state published through a watch channel. Every
/// transition updates this snapshot synchronously.
#[derive(Debug, Clone, Default)]
pub struct RunView {
    /// Most recent status document, kept across halts for rendering.
    pub latest: Option<RunStatus>,
    /// True while the engine is actively watching a run.
    pub polling: bool,
    /// Why the engine halted, when it halted abnormally.
    pub error: Option<AppError>,
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::api::types::{RunState, RunStatus};
    use crate::api::StatusFetcher;
    use crate::error::Result;
    use crate::history::HistoryReconciler;

    pub fn doc(run_id: &str, state: RunState) -> RunStatus {
        RunStatus {
            run_id: run_id.to_string(),
            state,
            summary: Default::default(),
            findings: Vec::new(),
            llm_comment_markdown: None,
            safe_to_merge: None,
            self_check: None,
            created_at: None,
        }
    }

    /// Pops scripted responses in order, then keeps answering "running".
    pub struct ScriptedFetcher {
        calls: AtomicU32,
        script: Mutex<VecDeque<Result<RunStatus>>>,
    }

    impl ScriptedFetcher {
        pub fn new(script: Vec<Result<RunStatus>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusFetcher for ScriptedFetcher {
        async fn fetch_status(&self, run_id: &str) -> Result<RunStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Ok(doc(run_id, RunState::Running)),
            }
        }
    }

    /// Blocks every call until the test releases it, then answers with the
    /// next scripted state for the requested run id.
    pub struct GatedFetcher {
        calls: AtomicU32,
        gate: Semaphore,
        states: Mutex<VecDeque<RunState>>,
    }

    impl GatedFetcher {
        pub fn new(states: Vec<RunState>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                gate: Semaphore::new(0),
                states: Mutex::new(states.into()),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl StatusFetcher for GatedFetcher {
        async fn fetch_status(&self, run_id: &str) -> Result<RunStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            let state = self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RunState::Running);
            Ok(doc(run_id, state))
        }
    }

    pub struct CountingReconciler {
        invocations: AtomicU32,
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl CountingReconciler {
        pub fn new() -> Self {
            Self {
                invocations: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn invocations(&self) -> u32 {
            self.invocations.load(Ordering::SeqCst)
        }

        pub fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistoryReconciler for CountingReconciler {
        async fn on_run_terminal(&self, run_id: &str) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(run_id.to_string());
            if self.fail {
                return Err(crate::error::AppError::Transport(
                    "history endpoint unavailable".to_string(),
                ));
            }
            Ok(())
        }
    }

    /// Yield enough times for spawned tasks to reach their next await point.
    pub async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}
