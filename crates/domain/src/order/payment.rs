//! Payment-method records attached to persisted orders.

use common::{CardId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// How an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Cash => "CASH",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(PaymentMethod::Card),
            "CASH" => Ok(PaymentMethod::Cash),
            other => Err(DomainError::UnknownValue {
                field: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

/// The payment tied to one order. `amount` is the grand total charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub card_id: Option<CardId>,
    pub amount: Money,
}

impl PaymentRecord {
    /// Builds the record for a payment made with `card_id`, or in cash when
    /// `None`.
    pub fn new(order_id: OrderId, card_id: Option<CardId>, amount: Money) -> Self {
        let method = match card_id {
            Some(_) => PaymentMethod::Card,
            None => PaymentMethod::Cash,
        };
        Self {
            order_id,
            method,
            card_id,
            amount,
        }
    }
}
