//! Session and application lifecycle signals.
//!
//! [`SessionGate`] carries the two process-wide signals every worker obeys:
//! whether a user is authenticated (and who), and whether the application is
//! still running. Both live in `watch` channels so waiters wake immediately
//! when either flips.

use std::sync::Arc;

use common::UserId;
use tokio::sync::watch;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.username, self.user_id)
    }
}

#[derive(Debug)]
struct Signals {
    identity: watch::Sender<Option<Identity>>,
    active: watch::Sender<bool>,
}

/// Lifecycle context shared by the foreground and every worker.
///
/// Once the application is shut down it never becomes active again, and no
/// new session can be opened.
#[derive(Debug, Clone)]
pub struct SessionGate {
    signals: Arc<Signals>,
}

impl SessionGate {
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        let (active, _) = watch::channel(true);
        Self {
            signals: Arc::new(Signals { identity, active }),
        }
    }

    /// Marks `identity` as authenticated.
    ///
    /// Returns false (and changes nothing) once the application is shutting
    /// down.
    pub fn open(&self, identity: Identity) -> bool {
        if !self.is_active() {
            return false;
        }
        tracing::info!(user = %identity, "session opened");
        self.signals.identity.send_replace(Some(identity));
        true
    }

    /// Clears the authenticated identity. Idempotent.
    pub fn close(&self) {
        if self.signals.identity.send_replace(None).is_some() {
            tracing::info!("session closed");
        }
    }

    /// Clears `appActive`. Irreversible and idempotent.
    pub fn shutdown(&self) {
        if self.signals.active.send_replace(false) {
            tracing::info!("application shutdown signalled");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.signals.identity.borrow().is_some()
    }

    pub fn is_active(&self) -> bool {
        *self.signals.active.borrow()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.signals.identity.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.signals.identity.borrow().as_ref().map(|i| i.user_id)
    }

    /// Waits until a user is authenticated.
    ///
    /// Returns `None` if the application shuts down first.
    pub async fn wait_authenticated(&self) -> Option<Identity> {
        let mut identity = self.signals.identity.subscribe();
        let mut active = self.signals.active.subscribe();
        loop {
            if !*active.borrow_and_update() {
                return None;
            }
            if let Some(current) = identity.borrow_and_update().clone() {
                return Some(current);
            }
            // The senders live as long as `self`, so `changed` cannot fail here.
            tokio::select! {
                _ = identity.changed() => {}
                _ = active.changed() => {}
            }
        }
    }

    /// Waits until the session ends: logout or application shutdown.
    pub async fn wait_session_end(&self) {
        let mut identity = self.signals.identity.subscribe();
        let mut active = self.signals.active.subscribe();
        loop {
            if !*active.borrow_and_update() || identity.borrow_and_update().is_none() {
                return;
            }
            tokio::select! {
                _ = identity.changed() => {}
                _ = active.changed() => {}
            }
        }
    }

    /// Waits until the application shuts down.
    pub async fn wait_shutdown(&self) {
        let mut active = self.signals.active.subscribe();
        // Only errors if the sender is dropped, which `self` prevents.
        let _ = active.wait_for(|active| !*active).await;
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}
