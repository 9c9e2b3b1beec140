//! Worker error types.

use common::{CardId, Money};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by worker entry points.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Input rejected by a domain rule; the caller may retry.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// The operation needs a signed-in user.
    #[error("No authenticated user")]
    NotAuthenticated,

    /// Unknown username or wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username or password do not meet the registration rules.
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// The card does not exist or belongs to someone else.
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    /// The card exists but has been deactivated.
    #[error("Card {0} is inactive")]
    CardInactive(CardId),

    /// The simulated gateway declined the charge.
    #[error("Payment of {amount} declined")]
    PaymentDeclined { amount: Money },

    /// No order of the current user has this folio.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The persistence collaborator failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The application is shutting down.
    #[error("Application is shutting down")]
    ShuttingDown,
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
