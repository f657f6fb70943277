use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{self, Instant};

use crate::api::types::RunStatus;
use crate::api::StatusFetcher;
use crate::error::{AppError, Result};
use crate::history::HistoryReconciler;
use crate::poll::{PollConfig, RunView, SessionPhase};

/// State shared between a session handle and its scheduler task. The lock
/// is never held across an await; the watch sender is only touched while
/// holding it, so view updates are ordered with phase changes.
pub(crate) struct Shared {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) view: watch::Sender<RunView>,
}

pub(crate) struct SessionState {
    /// Bumped on every start/refresh/cancel. A scheduler task may only
    /// mutate state while its own epoch is still current.
    pub(crate) epoch: u64,
    pub(crate) run_id: Option<String>,
    pub(crate) phase: SessionPhase,
    pub(crate) fetch_outstanding: bool,
    /// Wake handle for the current polling lifetime; replaced on restart
    /// so a stale nudge can never reach a newer loop.
    pub(crate) wake: Arc<Notify>,
}

/// Everything one polling lifetime needs. Owned by the spawned loop.
pub(crate) struct SchedulerContext {
    pub(crate) shared: Arc<Shared>,
    pub(crate) fetcher: Arc<dyn StatusFetcher>,
    pub(crate) reconciler: Option<Arc<dyn HistoryReconciler>>,
    pub(crate) run_id: String,
    pub(crate) epoch: u64,
    pub(crate) config: PollConfig,
    pub(crate) wake: Arc<Notify>,
}

/// What a fetch result means for the session, independent of any shared
/// state. Kept pure so the transition rule is testable on its own.
#[derive(Debug)]
pub(crate) enum TickOutcome {
    /// Run still in progress; publish the document and keep polling.
    Progress(RunStatus),
    /// Run reached completed/failed; publish and halt.
    Terminal(RunStatus),
    /// Fetch failed or the document is untrustworthy; halt without
    /// touching the latest document.
    Fault(AppError),
}

pub(crate) fn decide(expected_run_id: &str, result: Result<RunStatus>) -> TickOutcome {
    match result {
        Ok(status) if status.run_id != expected_run_id => {
            TickOutcome::Fault(AppError::Protocol(format!(
                "status document for run {} while polling run {}",
                status.run_id, expected_run_id
            )))
        }
        Ok(status) if status.state.is_terminal() => TickOutcome::Terminal(status),
        Ok(status) => TickOutcome::Progress(status),
        Err(e) => TickOutcome::Fault(e),
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum Applied {
    Continue,
    Terminal,
    Halt,
}

/// One polling lifetime: immediate first fetch, then one fetch per
/// interval, racing an independent deadline the whole way. When the
/// deadline and the next tick are due at the same instant the deadline
/// wins, so a run that never terminates times out after exactly
/// ceil(timeout / interval) fetches.
pub(crate) async fn run_poll_loop(ctx: SchedulerContext) {
    let started = Instant::now();
    let mut deadline = started + ctx.config.timeout;
    let mut next_tick = started;

    loop {
        tokio::select! {
            biased;
            _ = time::sleep_until(deadline) => {
                ctx.halt_timed_out(started.elapsed());
                return;
            }
            _ = ctx.wake.notified() => {
                // Explicit refresh: poll right away and grant a full window.
                deadline = Instant::now() + ctx.config.timeout;
            }
            _ = time::sleep_until(next_tick) => {}
        }

        if !ctx.begin_fetch() {
            return;
        }
        let result = tokio::select! {
            biased;
            _ = time::sleep_until(deadline) => {
                ctx.halt_timed_out(started.elapsed());
                return;
            }
            result = ctx.fetcher.fetch_status(&ctx.run_id) => result,
        };
        match ctx.apply(decide(&ctx.run_id, result)) {
            Applied::Continue => {}
            Applied::Terminal => {
                ctx.reconcile().await;
                return;
            }
            Applied::Halt => return,
        }
        next_tick = Instant::now() + ctx.config.interval;
    }
}

impl SchedulerContext {
    /// Marks a fetch outstanding. Returns false when this lifetime has
    /// been superseded and the loop must exit without side effects.
    fn begin_fetch(&self) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if state.epoch != self.epoch {
            return false;
        }
        state.fetch_outstanding = true;
        tracing::debug!(run_id = %self.run_id, "Fetching run status");
        true
    }

    fn apply(&self, outcome: TickOutcome) -> Applied {
        let mut state = self.shared.state.lock().unwrap();
        if state.epoch != self.epoch {
            return Applied::Halt;
        }
        state.fetch_outstanding = false;
        match outcome {
            TickOutcome::Progress(status) => {
                self.shared
                    .view
                    .send_modify(|view| view.latest = Some(status));
                Applied::Continue
            }
            TickOutcome::Terminal(status) => {
                state.phase = SessionPhase::Terminal(status.state);
                tracing::info!(
                    run_id = %self.run_id,
                    state = status.state.as_str(),
                    "Run reached a terminal state"
                );
                self.shared.view.send_modify(|view| {
                    view.latest = Some(status);
                    view.polling = false;
                });
                Applied::Terminal
            }
            TickOutcome::Fault(error) => {
                state.phase = SessionPhase::Errored;
                tracing::warn!(
                    run_id = %self.run_id,
                    error = %error,
                    "Status fetch failed; polling stopped"
                );
                self.shared.view.send_modify(|view| {
                    view.polling = false;
                    view.error = Some(error);
                });
                Applied::Halt
            }
        }
    }

    fn halt_timed_out(&self, waited: Duration) {
        let mut state = self.shared.state.lock().unwrap();
        if state.epoch != self.epoch {
            return;
        }
        state.fetch_outstanding = false;
        state.phase = SessionPhase::TimedOut;
        let waited_ms = waited.as_millis() as u64;
        tracing::warn!(
            run_id = %self.run_id,
            waited_ms,
            "Gave up waiting for a terminal status"
        );
        self.shared.view.send_modify(|view| {
            view.polling = false;
            view.error = Some(AppError::Timeout { waited_ms });
        });
    }

    /// Runs after a terminal transition under the current epoch, so the
    /// hook fires at most once per polling lifetime. Failures are logged
    /// and swallowed; they never reach the session's error channel.
    async fn reconcile(&self) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        if let Err(error) = reconciler.on_run_terminal(&self.run_id).await {
            tracing::warn!(
                run_id = %self.run_id,
                error = %error,
                "History reconciliation failed"
            );
        }
    }
}
