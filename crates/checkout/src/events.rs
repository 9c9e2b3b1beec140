//! Checkout events.

use chrono::{DateTime, Utc};
use common::{CardId, CheckoutId, Money, OrderId, UserId};
use domain::{PaymentMethod, ShippingMode};
use serde::{Deserialize, Serialize};

use crate::ports::PostPurchaseChoice;
use crate::state::CheckoutState;

/// Why an attempt ended before charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortReason {
    /// The customer did not confirm paying.
    NotConfirmed,
    /// The customer cancelled a prompt.
    Cancelled,
    /// Logout, idle timeout or application shutdown.
    SessionEnded,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::NotConfirmed => "NOT_CONFIRMED",
            AbortReason::Cancelled => "CANCELLED",
            AbortReason::SessionEnded => "SESSION_ENDED",
        }
    }
}

/// Events recorded while a checkout attempt runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    Started {
        checkout_id: CheckoutId,
        user_id: UserId,
        items: u32,
        total: Money,
        started_at: DateTime<Utc>,
    },

    /// An answer was rejected and the question will be asked again.
    InputRejected { state: CheckoutState, error: String },

    ShippingChosen { mode: ShippingMode, cost: Money },

    PaymentMethodChosen {
        method: PaymentMethod,
        card_id: Option<CardId>,
    },

    Charged {
        amount: Money,
        authorization: Option<String>,
    },

    ChargeFailed { amount: Money, error: String },

    Persisted { folio: String, order_id: OrderId },

    /// The purchase stands but its record may be incomplete.
    PersistenceFailed { folio: String, error: String },

    ReceiptRendered { folio: String },

    CartReset,

    Aborted {
        state: CheckoutState,
        reason: AbortReason,
    },

    PostPurchaseChoice { choice: PostPurchaseChoice },
}

impl CheckoutEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::Started { .. } => "Started",
            CheckoutEvent::InputRejected { .. } => "InputRejected",
            CheckoutEvent::ShippingChosen { .. } => "ShippingChosen",
            CheckoutEvent::PaymentMethodChosen { .. } => "PaymentMethodChosen",
            CheckoutEvent::Charged { .. } => "Charged",
            CheckoutEvent::ChargeFailed { .. } => "ChargeFailed",
            CheckoutEvent::Persisted { .. } => "Persisted",
            CheckoutEvent::PersistenceFailed { .. } => "PersistenceFailed",
            CheckoutEvent::ReceiptRendered { .. } => "ReceiptRendered",
            CheckoutEvent::CartReset => "CartReset",
            CheckoutEvent::Aborted { .. } => "Aborted",
            CheckoutEvent::PostPurchaseChoice { .. } => "PostPurchaseChoice",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(CheckoutEvent::CartReset.event_type(), "CartReset");
        let event = CheckoutEvent::ShippingChosen {
            mode: ShippingMode::Home,
            cost: Money::ZERO,
        };
        assert_eq!(event.event_type(), "ShippingChosen");
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = CheckoutEvent::Aborted {
            state: CheckoutState::AwaitShipping,
            reason: AbortReason::Cancelled,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Aborted");
        assert_eq!(json["data"]["state"], "AWAIT_SHIPPING");
        assert_eq!(json["data"]["reason"], "CANCELLED");

        let back: CheckoutEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_unit_event_round_trip() {
        let json = serde_json::to_string(&CheckoutEvent::CartReset).unwrap();
        let back: CheckoutEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CheckoutEvent::CartReset);
    }
}
