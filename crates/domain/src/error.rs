//! Domain error types.

use common::Money;
use thiserror::Error;

/// Validation failures raised by domain constructors and policies.
///
/// Every variant is recoverable: callers surface it to the user and let
/// them retry the same step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Card number is not 13 to 19 digits once separators are stripped.
    #[error("Invalid card number: expected 13 to 19 digits")]
    InvalidCardNumber,

    /// Card holder name is empty.
    #[error("Card holder name is required")]
    InvalidCardHolder,

    /// Expiry is not in `MM/YY` form.
    #[error("Invalid expiry '{0}': expected MM/YY")]
    InvalidExpiry(String),

    /// Home delivery address is missing or too short.
    #[error("Invalid shipping address: at least {min_len} characters are required")]
    InvalidAddress { min_len: usize },

    /// Product price must be positive.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: Money },

    /// Checkout was requested with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Refund amount is non-positive or exceeds what was paid.
    #[error("Invalid refund amount {amount}: must be between $0.01 and {limit}")]
    InvalidRefund { amount: Money, limit: Money },

    /// Unknown textual value for an enumerated field.
    #[error("Unknown {field} value '{value}'")]
    UnknownValue { field: &'static str, value: String },
}
