use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::api::StatusFetcher;
use crate::history::HistoryReconciler;
use crate::poll::scheduler::{self, SchedulerContext, SessionState, Shared};
use crate::poll::{PollConfig, RunView, SessionPhase};

/// Owns a run subscription: at most one run is watched at a time, through
/// at most one scheduler task, with at most one fetch in flight.
///
/// `start`, `refresh`, and `cancel` are synchronous; the polling itself
/// happens on a spawned task that publishes every transition through the
/// watch channel (`subscribe`/`snapshot`). Superseded lifetimes are fenced
/// by an epoch as well as aborted, so a result that arrives after a
/// `cancel` or a newer `start` can never alter what observers see.
pub struct RunSession {
    shared: Arc<Shared>,
    fetcher: Arc<dyn StatusFetcher>,
    reconciler: Option<Arc<dyn HistoryReconciler>>,
    config: PollConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
    view_rx: watch::Receiver<RunView>,
}

impl RunSession {
    pub fn new(
        fetcher: Arc<dyn StatusFetcher>,
        reconciler: Option<Arc<dyn HistoryReconciler>>,
        config: PollConfig,
    ) -> Self {
        let (view, view_rx) = watch::channel(RunView::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                epoch: 0,
                run_id: None,
                phase: SessionPhase::Idle,
                fetch_outstanding: false,
                wake: Arc::new(Notify::new()),
            }),
            view,
        });
        Self {
            shared,
            fetcher,
            reconciler,
            config,
            handle: Mutex::new(None),
            view_rx,
        }
    }

    /// Binds the session to a run and begins polling it. Replaces any
    /// active subscription; binding a different run discards the previous
    /// run's document, rebinding the same run keeps it.
    pub fn start(&self, run_id: &str) {
        let (epoch, wake) = {
            let mut state = self.shared.state.lock().unwrap();
            state.epoch += 1;
            let rebound = state.run_id.as_deref() != Some(run_id);
            state.run_id = Some(run_id.to_string());
            state.phase = SessionPhase::Polling;
            state.fetch_outstanding = false;
            state.wake = Arc::new(Notify::new());
            self.shared.view.send_modify(|view| {
                if rebound {
                    view.latest = None;
                }
                view.polling = true;
                view.error = None;
            });
            (state.epoch, Arc::clone(&state.wake))
        };
        tracing::info!(
            run_id = %run_id,
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Watching run"
        );
        self.spawn_loop(run_id.to_string(), epoch, wake);
    }

    /// Requests an immediate poll. While polling this also restarts the
    /// timeout clock; it is a no-op when a fetch is already in flight or
    /// nothing is bound. After a halt (terminal, timed out, errored) it
    /// begins a fresh polling lifetime for the same run, keeping the last
    /// document.
    pub fn refresh(&self) {
        let restart = {
            let mut state = self.shared.state.lock().unwrap();
            match state.phase {
                SessionPhase::Polling => {
                    if !state.fetch_outstanding {
                        tracing::debug!("Refresh requested; polling immediately");
                        state.wake.notify_one();
                    }
                    None
                }
                SessionPhase::Idle => None,
                _ => state.run_id.clone().map(|run_id| {
                    state.epoch += 1;
                    state.phase = SessionPhase::Polling;
                    state.fetch_outstanding = false;
                    state.wake = Arc::new(Notify::new());
                    self.shared.view.send_modify(|view| {
                        view.polling = true;
                        view.error = None;
                    });
                    (run_id, state.epoch, Arc::clone(&state.wake))
                }),
            }
        };
        if let Some((run_id, epoch, wake)) = restart {
            tracing::info!(run_id = %run_id, "Resuming polling after halt");
            self.spawn_loop(run_id, epoch, wake);
        }
    }

    /// Abandons the current subscription. Nothing is fetched and nothing
    /// in the view changes afterwards, even if a fetch was mid-flight.
    /// Idempotent, and safe to call after the session already halted.
    pub fn cancel(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.epoch += 1;
            state.fetch_outstanding = false;
            if state.phase == SessionPhase::Polling {
                state.phase = SessionPhase::Idle;
                tracing::info!(run_id = ?state.run_id, "Polling cancelled");
                self.shared.view.send_modify(|view| view.polling = false);
            }
        }
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Current view, cloned out of the watch channel.
    pub fn snapshot(&self) -> RunView {
        self.view_rx.borrow().clone()
    }

    /// New receiver for the view channel. The value at subscription time
    /// counts as seen; take a `snapshot` first when rendering immediately.
    pub fn subscribe(&self) -> watch::Receiver<RunView> {
        self.shared.view.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().unwrap().phase
    }

    pub fn run_id(&self) -> Option<String> {
        self.shared.state.lock().unwrap().run_id.clone()
    }

    /// Waits for the current scheduler task to wind down. After a terminal
    /// status this includes the reconcile step, so history read afterwards
    /// reflects the finished run.
    pub async fn join(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn spawn_loop(&self, run_id: String, epoch: u64, wake: Arc<Notify>) {
        let ctx = SchedulerContext {
            shared: Arc::clone(&self.shared),
            fetcher: Arc::clone(&self.fetcher),
            reconciler: self.reconciler.clone(),
            run_id,
            epoch,
            config: self.config,
            wake,
        };
        let handle = tokio::spawn(scheduler::run_poll_loop(ctx));
        if let Some(previous) = self.handle.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}
