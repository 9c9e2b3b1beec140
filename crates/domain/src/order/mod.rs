//! Orders created at the end of a successful checkout.
//!
//! An order is written exactly once, when the payment has gone through, and
//! is read-only afterwards.

mod folio;
mod payment;

pub use folio::{FOLIO_PREFIX, Folio, FolioGenerator};
pub use payment::{PaymentMethod, PaymentRecord};

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{CartSnapshot, DomainError, LineItem, ShippingChoice, ShippingMode};

/// Status of a persisted order. Checkout only ever produces `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(DomainError::UnknownValue {
                field: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// A line of an order, copied from the cart at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

impl From<&LineItem> for OrderLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// An order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub folio: Folio,
    pub created_at: DateTime<Utc>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_mode: ShippingMode,
    pub shipping_address: Option<String>,
    pub shipping_cost: Money,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
}

impl NewOrder {
    /// Snapshots the cart into an order.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyCart`] if the snapshot has no lines.
    pub fn from_snapshot(
        user_id: UserId,
        folio: Folio,
        cart: &CartSnapshot,
        shipping: &ShippingChoice,
        shipping_cost: Money,
    ) -> Result<Self, DomainError> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        Ok(Self {
            user_id,
            folio,
            created_at: Utc::now(),
            subtotal: cart.subtotal,
            discount: cart.discount,
            shipping_mode: shipping.mode,
            shipping_address: shipping.address.clone(),
            shipping_cost,
            status: OrderStatus::Completed,
            lines: cart.items.iter().map(OrderLine::from).collect(),
        })
    }

    /// Attaches the identifier assigned by storage.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            folio: self.folio,
            created_at: self.created_at,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping_mode: self.shipping_mode,
            shipping_address: self.shipping_address,
            shipping_cost: self.shipping_cost,
            status: self.status,
            lines: self.lines,
        }
    }

    pub fn total(&self) -> Money {
        self.subtotal - self.discount
    }

    pub fn grand_total(&self) -> Money {
        self.total() + self.shipping_cost
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub folio: Folio,
    pub created_at: DateTime<Utc>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_mode: ShippingMode,
    pub shipping_address: Option<String>,
    pub shipping_cost: Money,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Subtotal minus discount.
    pub fn total(&self) -> Money {
        self.subtotal - self.discount
    }

    /// What the customer paid: total plus shipping.
    pub fn grand_total(&self) -> Money {
        self.total() + self.shipping_cost
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} items {} ({})",
            self.folio,
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.item_count(),
            self.grand_total(),
            self.status
        )
    }
}
