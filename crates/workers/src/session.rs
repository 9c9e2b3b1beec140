use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{Identity, Result, SessionGate, Worker};

const NOT_STARTED: u64 = u64::MAX;

/// Tracks session start and activity, and ends the session.
///
/// Times are kept as milliseconds since the supervisor was created so they
/// can be read and written without locking.
pub struct SessionSupervisor {
    gate: SessionGate,
    epoch: Instant,
    started_ms: AtomicU64,
    last_activity_ms: AtomicU64,
    ended: AtomicBool,
    heartbeat: Duration,
    idle_timeout: Option<Duration>,
}

impl SessionSupervisor {
    pub fn new(gate: SessionGate, heartbeat: Duration, idle_timeout: Option<Duration>) -> Self {
        Self {
            gate,
            epoch: Instant::now(),
            started_ms: AtomicU64::new(NOT_STARTED),
            last_activity_ms: AtomicU64::new(0),
            ended: AtomicBool::new(false),
            heartbeat,
            idle_timeout,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Records user activity.
    pub fn touch(&self) {
        self.last_activity_ms.store(self.now_ms(), Ordering::Relaxed);
    }

    /// How long the session has been open, if it has started.
    pub fn session_duration(&self) -> Option<Duration> {
        let started = self.started_ms.load(Ordering::Relaxed);
        (started != NOT_STARTED)
            .then(|| Duration::from_millis(self.now_ms().saturating_sub(started)))
    }

    /// Time since the last recorded activity.
    pub fn idle_time(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Ends the session and closes the gate.
    ///
    /// Idempotent: returns true only for the call that actually ended it.
    pub fn end_session(&self) -> bool {
        if !self.finish() {
            return false;
        }
        self.gate.close();
        true
    }

    fn finish(&self) -> bool {
        if self.ended.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(duration) = self.session_duration() {
            metrics::histogram!("session_duration_seconds").record(duration.as_secs_f64());
            tracing::info!(duration_secs = duration.as_secs(), "session ended");
        }
        true
    }

    fn idle_expired(&self) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| self.idle_time() >= timeout)
    }

    fn next_wake(&self) -> Duration {
        match self.idle_timeout {
            Some(timeout) => self
                .heartbeat
                .min(timeout.saturating_sub(self.idle_time()))
                .max(Duration::from_millis(1)),
            None => self.heartbeat,
        }
    }
}

#[async_trait]
impl Worker for SessionSupervisor {
    fn name(&self) -> &'static str {
        "session-supervisor"
    }

    async fn run_active(&self, identity: &Identity) -> Result<()> {
        let now = self.now_ms();
        self.started_ms.store(now, Ordering::Relaxed);
        self.last_activity_ms.store(now, Ordering::Relaxed);
        tracing::info!(user = %identity, "session started");

        loop {
            tokio::time::sleep(self.next_wake()).await;
            if self.idle_expired() {
                tracing::info!(
                    idle_secs = self.idle_time().as_secs(),
                    "idle timeout reached"
                );
                self.end_session();
                return Ok(());
            }
            tracing::debug!(
                session_secs = self.session_duration().unwrap_or_default().as_secs(),
                idle_secs = self.idle_time().as_secs(),
                "session heartbeat"
            );
        }
    }

    /// Records the duration when the session ended by logout or shutdown
    /// rather than through [`end_session`](SessionSupervisor::end_session).
    async fn on_stop(&self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::UserId;

    use super::*;
    use crate::{WorkerSet, WorkerState};

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new(1),
            username: "ana".to_string(),
        }
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let gate = SessionGate::new();
        gate.open(identity());
        let supervisor = SessionSupervisor::new(gate.clone(), Duration::from_secs(30), None);

        assert!(supervisor.end_session());
        assert!(!supervisor.end_session());
        assert!(!gate.is_authenticated());
        assert!(supervisor.has_ended());
    }

    #[tokio::test]
    async fn test_duration_unknown_before_start() {
        let supervisor =
            SessionSupervisor::new(SessionGate::new(), Duration::from_secs(30), None);
        assert!(supervisor.session_duration().is_none());
    }

    #[tokio::test]
    async fn test_touch_resets_idle_time() {
        let supervisor =
            SessionSupervisor::new(SessionGate::new(), Duration::from_secs(30), None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(supervisor.idle_time() >= Duration::from_millis(20));

        supervisor.touch();
        assert!(supervisor.idle_time() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_session() {
        let gate = SessionGate::new();
        let supervisor = Arc::new(SessionSupervisor::new(
            gate.clone(),
            Duration::from_secs(30),
            Some(Duration::from_millis(50)),
        ));
        let mut set = WorkerSet::new(gate.clone());
        set.spawn(supervisor.clone());

        gate.open(identity());
        tokio::time::timeout(Duration::from_secs(2), set.wait_for_all(WorkerState::Stopped))
            .await
            .unwrap();

        assert!(!gate.is_authenticated());
        assert!(supervisor.has_ended());
        assert!(supervisor.session_duration().unwrap() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_logout_records_end() {
        let gate = SessionGate::new();
        let supervisor = Arc::new(SessionSupervisor::new(gate.clone(), Duration::from_secs(30), None));
        let mut set = WorkerSet::new(gate.clone());
        set.spawn(supervisor.clone());

        gate.open(identity());
        set.wait_for_all(WorkerState::Active).await;
        gate.close();
        set.wait_for_all(WorkerState::Stopped).await;

        assert!(supervisor.has_ended());
    }
}
