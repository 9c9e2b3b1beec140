//! Domain layer for the checkout simulator.
//!
//! This crate provides the core domain types including:
//! - [`SharedCart`], the lock-protected cart every worker observes
//! - Tiered discount and shipping-cost policies (pure functions)
//! - Payment cards with validated numbers and masked display
//! - Orders, folios, payment records and return requests

pub mod card;
pub mod cart;
pub mod error;
pub mod order;
pub mod pricing;
pub mod product;
pub mod returns;
pub mod shipping;

pub use card::{Card, CardBrand, CardNumber, Expiry, NewCard};
pub use cart::{CartFingerprint, CartSnapshot, LineItem, SharedCart};
pub use error::DomainError;
pub use order::{
    FOLIO_PREFIX, Folio, FolioGenerator, NewOrder, Order, OrderLine, OrderStatus, PaymentMethod,
    PaymentRecord,
};
pub use pricing::{DISCOUNT_TIERS, DiscountRate, DiscountTier};
pub use product::Product;
pub use returns::{NewReturn, Return, ReturnReason, ReturnStatus};
pub use shipping::{ShippingChoice, ShippingMode, ShippingPolicy};
