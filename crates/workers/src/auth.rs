use std::sync::Arc;

use common::UserId;
use store::UserDirectory;

use crate::{Identity, Result, SessionGate, WorkerError};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 4;

/// The login step: validates credentials and opens the session gate.
pub struct Authenticator {
    users: Arc<dyn UserDirectory>,
    gate: SessionGate,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserDirectory>, gate: SessionGate) -> Self {
        Self { users, gate }
    }

    /// Signs a user in. On success every gated worker activates.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let username = username.trim();
        if !self.users.validate_credentials(username, password).await? {
            tracing::warn!("login rejected");
            return Err(WorkerError::InvalidCredentials);
        }
        let user_id = self
            .users
            .find_id(username)
            .await?
            .ok_or(WorkerError::InvalidCredentials)?;

        let identity = Identity {
            user_id,
            username: username.to_string(),
        };
        if !self.gate.open(identity.clone()) {
            return Err(WorkerError::ShuttingDown);
        }
        Ok(identity)
    }

    /// Creates an account. Does not sign in.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<UserId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(WorkerError::InvalidRegistration(
                "username is required".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(WorkerError::InvalidRegistration(format!(
                "password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user_id = self.users.register(username, password).await?;
        tracing::info!(%user_id, "user registered");
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, StoreError};

    use super::*;

    fn authenticator() -> (Authenticator, SessionGate) {
        let gate = SessionGate::new();
        (
            Authenticator::new(Arc::new(InMemoryStore::new()), gate.clone()),
            gate,
        )
    }

    #[tokio::test]
    async fn test_login_opens_gate() {
        let (auth, gate) = authenticator();
        let id = auth.register("ana", "secret").await.unwrap();

        let identity = auth.login(" ana ", "secret").await.unwrap();

        assert_eq!(identity.user_id, id);
        assert_eq!(gate.identity(), Some(identity));
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_gate_closed() {
        let (auth, gate) = authenticator();
        auth.register("ana", "secret").await.unwrap();

        let err = auth.login("ana", "nope").await.unwrap_err();

        assert!(matches!(err, WorkerError::InvalidCredentials));
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_rules() {
        let (auth, _gate) = authenticator();

        assert!(matches!(
            auth.register("  ", "secret").await,
            Err(WorkerError::InvalidRegistration(_))
        ));
        assert!(matches!(
            auth.register("ana", "abc").await,
            Err(WorkerError::InvalidRegistration(_))
        ));
        auth.register("ana", "abcd").await.unwrap();
        assert!(matches!(
            auth.register("ana", "abcd").await,
            Err(WorkerError::Persistence(StoreError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_refused_after_shutdown() {
        let (auth, gate) = authenticator();
        auth.register("ana", "secret").await.unwrap();
        gate.shutdown();

        assert!(matches!(
            auth.login("ana", "secret").await,
            Err(WorkerError::ShuttingDown)
        ));
    }
}
