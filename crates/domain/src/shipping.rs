//! Shipping modes and the shipping-cost policy.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingMode {
    /// Customer collects the order in store.
    Pickup,
    /// Delivered to the customer's address.
    Home,
}

impl ShippingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMode::Pickup => "PICKUP",
            ShippingMode::Home => "HOME",
        }
    }
}

impl std::fmt::Display for ShippingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShippingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PICKUP" => Ok(ShippingMode::Pickup),
            "HOME" => Ok(ShippingMode::Home),
            other => Err(DomainError::UnknownValue {
                field: "shipping mode",
                value: other.to_string(),
            }),
        }
    }
}

/// A shipping decision collected from the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingChoice {
    pub mode: ShippingMode,
    pub address: Option<String>,
}

impl ShippingChoice {
    pub fn pickup() -> Self {
        Self {
            mode: ShippingMode::Pickup,
            address: None,
        }
    }

    pub fn home(address: impl Into<String>) -> Self {
        Self {
            mode: ShippingMode::Home,
            address: Some(address.into()),
        }
    }
}

/// Shipping-cost and address rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Fee charged for home delivery below the free-shipping threshold.
    pub base_fee: Money,
    /// Subtotal (inclusive) from which home delivery is free.
    pub free_threshold: Money,
    /// Minimum trimmed length of a home delivery address.
    pub min_address_len: usize,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            base_fee: Money::from_units(50),
            free_threshold: Money::from_units(500),
            min_address_len: 20,
        }
    }
}

impl ShippingPolicy {
    /// Shipping cost for an order with the given subtotal.
    pub fn cost(&self, subtotal: Money, mode: ShippingMode) -> Money {
        match mode {
            ShippingMode::Pickup => Money::ZERO,
            ShippingMode::Home if subtotal >= self.free_threshold => Money::ZERO,
            ShippingMode::Home => self.base_fee,
        }
    }

    /// Structural presence check only; no postal validation.
    pub fn is_valid_address(&self, address: &str) -> bool {
        let trimmed = address.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= self.min_address_len
    }

    /// Validates a choice and normalizes its address.
    ///
    /// Pickup drops any address; home delivery requires a valid one.
    pub fn validate(&self, choice: ShippingChoice) -> Result<ShippingChoice, DomainError> {
        match choice.mode {
            ShippingMode::Pickup => Ok(ShippingChoice::pickup()),
            ShippingMode::Home => match choice.address.as_deref() {
                Some(address) if self.is_valid_address(address) => {
                    Ok(ShippingChoice::home(address.trim()))
                }
                _ => Err(DomainError::InvalidAddress {
                    min_len: self.min_address_len,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "Av. Juarez 120, Col. Centro, CP 52600";

    #[test]
    fn test_pickup_is_free() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.cost(Money::from_units(10), ShippingMode::Pickup), Money::ZERO);
    }

    #[test]
    fn test_home_fee_below_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(
            policy.cost(Money::from_cents(49_999), ShippingMode::Home),
            Money::from_units(50)
        );
        assert_eq!(policy.cost(Money::from_units(500), ShippingMode::Home), Money::ZERO);
    }

    #[test]
    fn test_address_validation() {
        let policy = ShippingPolicy::default();
        assert!(!policy.is_valid_address(""));
        assert!(!policy.is_valid_address("   short street    "));
        assert!(policy.is_valid_address(ADDRESS));
    }

    #[test]
    fn test_validate_choice() {
        let policy = ShippingPolicy::default();
        assert!(matches!(
            policy.validate(ShippingChoice::home("nope")),
            Err(DomainError::InvalidAddress { min_len: 20 })
        ));
        assert!(policy.validate(ShippingChoice { mode: ShippingMode::Home, address: None }).is_err());

        let ok = policy.validate(ShippingChoice::home(format!("  {ADDRESS} "))).unwrap();
        assert_eq!(ok.address.as_deref(), Some(ADDRESS));

        let pickup = policy
            .validate(ShippingChoice {
                mode: ShippingMode::Pickup,
                address: Some(ADDRESS.to_string()),
            })
            .unwrap();
        assert_eq!(pickup.address, None);
    }

    #[test]
    fn test_mode_round_trip_through_str() {
        assert_eq!("HOME".parse::<ShippingMode>().unwrap(), ShippingMode::Home);
        assert!("MAIL".parse::<ShippingMode>().is_err());
    }
}
