//! The gated worker lifecycle.
//!
//! ```text
//! WaitingAuth ──► Active ──► Stopped
//!      │                        ▲
//!      └────────────────────────┘  (shutdown before any login)
//! ```
//!
//! A worker does nothing until a user is authenticated, runs its active loop
//! for the duration of the session, and stops for good when the session ends
//! or the application shuts down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{Identity, Result, SessionGate};

/// Lifecycle state of a gated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkerState {
    #[default]
    WaitingAuth,
    Active,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::WaitingAuth => "WAITING_AUTH",
            WorkerState::Active => "ACTIVE",
            WorkerState::Stopped => "STOPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A background component that only runs while a session is open.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Name used in logs and shutdown reports.
    fn name(&self) -> &'static str;

    /// The worker's loop for an authenticated session.
    ///
    /// The runner drops this future as soon as the session ends, so it may
    /// loop forever. Collaborator failures should be logged and the loop
    /// continued; returning an error stops the worker.
    async fn run_active(&self, identity: &Identity) -> Result<()>;

    /// Called once after the active loop ends.
    async fn on_stop(&self) {}
}

async fn run_gated(worker: Arc<dyn Worker>, gate: SessionGate, state: watch::Sender<WorkerState>) {
    let name = worker.name();
    tracing::debug!(worker = name, "waiting for authentication");

    let Some(identity) = gate.wait_authenticated().await else {
        state.send_replace(WorkerState::Stopped);
        tracing::debug!(worker = name, "stopped before activation");
        return;
    };

    state.send_replace(WorkerState::Active);
    tracing::info!(worker = name, user_id = %identity.user_id, "worker active");

    tokio::select! {
        result = worker.run_active(&identity) => {
            if let Err(e) = result {
                tracing::error!(worker = name, error = %e, "worker loop failed");
            }
        }
        _ = gate.wait_session_end() => {}
    }

    worker.on_stop().await;
    state.send_replace(WorkerState::Stopped);
    tracing::info!(worker = name, "worker stopped");
}

struct WorkerHandle {
    name: &'static str,
    state: watch::Receiver<WorkerState>,
    join: JoinHandle<()>,
}

/// Outcome of [`WorkerSet::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited within the grace period.
    pub stopped: Vec<&'static str>,
    /// Workers still running when their grace period ran out. They are left
    /// running, not aborted.
    pub lagging: Vec<&'static str>,
    /// Workers whose task panicked.
    pub failed: Vec<&'static str>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.lagging.is_empty() && self.failed.is_empty()
    }
}

/// The running set of gated workers.
pub struct WorkerSet {
    gate: SessionGate,
    handles: Vec<WorkerHandle>,
}

impl WorkerSet {
    pub fn new(gate: SessionGate) -> Self {
        Self {
            gate,
            handles: Vec::new(),
        }
    }

    /// Spawns a worker on the runtime. It starts in `WaitingAuth`.
    pub fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let (state_tx, state_rx) = watch::channel(WorkerState::WaitingAuth);
        let name = worker.name();
        let join = tokio::spawn(run_gated(worker, self.gate.clone(), state_tx));
        self.handles.push(WorkerHandle {
            name,
            state: state_rx,
            join,
        });
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// Current state of every worker, in spawn order.
    pub fn states(&self) -> Vec<(&'static str, WorkerState)> {
        self.handles
            .iter()
            .map(|h| (h.name, *h.state.borrow()))
            .collect()
    }

    /// Waits until every worker has reached `target` (or stopped).
    pub async fn wait_for_all(&self, target: WorkerState) {
        for handle in &self.handles {
            let mut rx = handle.state.clone();
            let _ = rx.wait_for(|s| *s == target || s.is_terminal()).await;
        }
    }

    /// Clears `appActive` and joins each worker for at most `grace`.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        self.gate.shutdown();

        let mut report = ShutdownReport::default();
        for mut handle in self.handles {
            match tokio::time::timeout(grace, &mut handle.join).await {
                Ok(Ok(())) => report.stopped.push(handle.name),
                Ok(Err(e)) => {
                    tracing::error!(worker = handle.name, error = %e, "worker task failed");
                    report.failed.push(handle.name);
                }
                Err(_) => {
                    tracing::warn!(
                        worker = handle.name,
                        grace_ms = grace.as_millis() as u64,
                        "worker did not stop within grace period"
                    );
                    report.lagging.push(handle.name);
                }
            }
        }

        tracing::info!(
            stopped = report.stopped.len(),
            lagging = report.lagging.len(),
            failed = report.failed.len(),
            "workers shut down"
        );
        report
    }
}
