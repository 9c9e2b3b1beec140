//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout attempt.
///
/// State transitions:
/// ```text
/// Idle ──► AwaitShipping ──► AwaitCard ──► Charging ──► Persisting ──► Notifying
///               │                │            │             │             │
///               ▼                ▼            ▼             ▼             ▼
///            Aborted          Aborted       Failed        Failed       Resetting
///                                                                         │
///                          Idle ◄── AwaitPostPurchaseChoice ◄─────────────┘
///                                            │
///                                            ▼
///                                         Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    /// No attempt in progress.
    #[default]
    Idle,

    /// Waiting for the customer's shipping choice.
    AwaitShipping,

    /// Waiting for the customer's card or cash choice.
    AwaitCard,

    /// Charging the grand total.
    Charging,

    /// Writing the order and its payment record.
    Persisting,

    /// Confirming the purchase and rendering the receipt.
    Notifying,

    /// Clearing the cart.
    Resetting,

    /// Waiting for what to do after a completed purchase.
    AwaitPostPurchaseChoice,

    /// Cancelled while waiting for the customer (terminal state).
    Aborted,

    /// Charge failed (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if the state waits on a foreground decision.
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self,
            CheckoutState::AwaitShipping
                | CheckoutState::AwaitCard
                | CheckoutState::AwaitPostPurchaseChoice
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Aborted | CheckoutState::Failed)
    }

    /// Returns true if an attempt may move from `self` to `next`.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;

        match (*self, next) {
            (from, Aborted) => from.is_awaiting(),
            (Charging | Persisting, Failed) => true,
            (Idle, AwaitShipping)
            | (AwaitShipping, AwaitCard)
            | (AwaitCard, Charging)
            | (Charging, Persisting)
            | (Persisting, Notifying)
            | (Notifying, Resetting)
            | (Resetting, AwaitPostPurchaseChoice)
            | (AwaitPostPurchaseChoice, Idle) => true,
            _ => false,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "IDLE",
            CheckoutState::AwaitShipping => "AWAIT_SHIPPING",
            CheckoutState::AwaitCard => "AWAIT_CARD",
            CheckoutState::Charging => "CHARGING",
            CheckoutState::Persisting => "PERSISTING",
            CheckoutState::Notifying => "NOTIFYING",
            CheckoutState::Resetting => "RESETTING",
            CheckoutState::AwaitPostPurchaseChoice => "AWAIT_POST_PURCHASE_CHOICE",
            CheckoutState::Aborted => "ABORTED",
            CheckoutState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
