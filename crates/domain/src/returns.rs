//! Return requests against completed orders.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ReturnId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Folio};

/// Why the customer is returning the purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnReason {
    WrongCharge,
    Damaged,
    Expired,
}

impl ReturnReason {
    pub const ALL: [ReturnReason; 3] = [
        ReturnReason::WrongCharge,
        ReturnReason::Damaged,
        ReturnReason::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::WrongCharge => "WRONG_CHARGE",
            ReturnReason::Damaged => "DAMAGED",
            ReturnReason::Expired => "EXPIRED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReturnReason::WrongCharge => "Wrong charge",
            ReturnReason::Damaged => "Damaged product",
            ReturnReason::Expired => "Expired product",
        }
    }
}

impl std::fmt::Display for ReturnReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::str::FromStr for ReturnReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "WRONG_CHARGE" => Ok(ReturnReason::WrongCharge),
            "DAMAGED" => Ok(ReturnReason::Damaged),
            "EXPIRED" => Ok(ReturnReason::Expired),
            _ => Err(DomainError::UnknownValue {
                field: "return reason",
                value: s.to_string(),
            }),
        }
    }
}

/// Processing status of a return.
///
/// ```text
/// Pending ──► Processed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    #[default]
    Pending,
    Processed,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "PENDING",
            ReturnStatus::Processed => "PROCESSED",
        }
    }

    /// Returns true if the status may move to `next`.
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        matches!((self, next), (ReturnStatus::Pending, ReturnStatus::Processed))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReturnStatus::Processed)
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReturnStatus::Pending),
            "PROCESSED" => Ok(ReturnStatus::Processed),
            other => Err(DomainError::UnknownValue {
                field: "return status",
                value: other.to_string(),
            }),
        }
    }
}

/// A validated return request, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReturn {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub folio: Folio,
    pub reason: ReturnReason,
    pub amount: Money,
    pub note: String,
}

impl NewReturn {
    /// Builds a return request, checking the refund against what was paid.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidRefund`] if `amount` is not positive or exceeds
    /// `paid`.
    pub fn new(
        user_id: UserId,
        order_id: OrderId,
        folio: Folio,
        reason: ReturnReason,
        amount: Money,
        paid: Money,
        note: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if !amount.is_positive() || amount > paid {
            return Err(DomainError::InvalidRefund {
                amount,
                limit: paid,
            });
        }

        Ok(Self {
            user_id,
            order_id,
            folio,
            reason,
            amount,
            note: note.into().trim().to_string(),
        })
    }

    pub fn into_return(self, id: ReturnId) -> Return {
        Return {
            id,
            user_id: self.user_id,
            order_id: self.order_id,
            folio: self.folio,
            reason: self.reason,
            status: ReturnStatus::Pending,
            amount: self.amount,
            note: self.note,
            created_at: Utc::now(),
        }
    }
}

/// A persisted return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Return {
    pub id: ReturnId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub folio: Folio,
    pub reason: ReturnReason,
    pub status: ReturnStatus,
    pub amount: Money,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Return {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {} {} [{}]",
            self.id, self.folio, self.reason, self.amount, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: Money) -> Result<NewReturn, DomainError> {
        NewReturn::new(
            UserId::new(1),
            OrderId::new(2),
            Folio::new("ORD-1"),
            ReturnReason::Damaged,
            amount,
            Money::from_units(100),
            "  box was crushed ",
        )
    }

    #[test]
    fn test_refund_bounds() {
        assert!(request(Money::from_units(100)).is_ok());
        assert!(request(Money::from_cents(1)).is_ok());
        assert!(matches!(
            request(Money::ZERO),
            Err(DomainError::InvalidRefund { .. })
        ));
        assert!(matches!(
            request(Money::from_cents(10_001)),
            Err(DomainError::InvalidRefund { .. })
        ));
    }

    #[test]
    fn test_new_return_starts_pending() {
        let ret = request(Money::from_units(10))
            .unwrap()
            .into_return(ReturnId::new(5));
        assert_eq!(ret.status, ReturnStatus::Pending);
        assert_eq!(ret.note, "box was crushed");
    }

    #[test]
    fn test_status_transitions() {
        assert!(ReturnStatus::Pending.can_transition_to(ReturnStatus::Processed));
        assert!(!ReturnStatus::Processed.can_transition_to(ReturnStatus::Pending));
        assert!(!ReturnStatus::Pending.can_transition_to(ReturnStatus::Pending));
        assert!(ReturnStatus::Processed.is_terminal());
    }

    #[test]
    fn test_reason_parsing_is_lenient() {
        assert_eq!("wrong charge".parse::<ReturnReason>().unwrap(), ReturnReason::WrongCharge);
        assert_eq!("EXPIRED".parse::<ReturnReason>().unwrap(), ReturnReason::Expired);
        assert!("lost".parse::<ReturnReason>().is_err());
    }
}
