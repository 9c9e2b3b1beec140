//! Checkout error types.

use common::{CardId, Money};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;
use workers::WorkerError;

use crate::state::CheckoutState;

/// Errors that can occur during a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Input rejected by a domain rule. The attempt stays in its current
    /// state and the customer is asked again.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// The gateway declined the charge.
    #[error("Payment of {amount} declined")]
    PaymentDeclined { amount: Money },

    /// The card cannot be charged at all (unknown, foreign or inactive).
    #[error("Card {card_id} rejected: {reason}")]
    CardRejected { card_id: CardId, reason: String },

    /// A persistence collaborator failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The application is shutting down.
    #[error("Checkout cancelled: application is shutting down")]
    Cancelled,

    /// Checkout needs a signed-in user.
    #[error("No authenticated user")]
    NotAuthenticated,

    /// A collaborator failed in a way checkout has no specific handling for.
    #[error("Service error: {0}")]
    Service(String),

    /// The orchestrator is in the wrong state for the request.
    #[error("Invalid checkout state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: String,
        actual: CheckoutState,
    },
}

impl From<WorkerError> for CheckoutError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Validation(e) => CheckoutError::Validation(e),
            WorkerError::PaymentDeclined { amount } => CheckoutError::PaymentDeclined { amount },
            WorkerError::CardNotFound(card_id) => CheckoutError::CardRejected {
                card_id,
                reason: "card not found".to_string(),
            },
            WorkerError::CardInactive(card_id) => CheckoutError::CardRejected {
                card_id,
                reason: "card is inactive".to_string(),
            },
            WorkerError::Persistence(e) => CheckoutError::Persistence(e),
            WorkerError::NotAuthenticated | WorkerError::InvalidCredentials => {
                CheckoutError::NotAuthenticated
            }
            WorkerError::ShuttingDown => CheckoutError::Cancelled,
            other @ (WorkerError::OrderNotFound(_) | WorkerError::InvalidRegistration(_)) => {
                CheckoutError::Service(other.to_string())
            }
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
