//! Transient state of one checkout attempt.

use chrono::{DateTime, Utc};
use common::{CheckoutId, Money, OrderId, UserId};
use domain::{CartSnapshot, Folio, ShippingChoice};
use serde::Serialize;

use crate::ports::{PaymentChoice, ShippingQuote};

/// Everything collected while one attempt runs.
///
/// Created when an attempt starts and dropped when it ends; only the
/// orchestrator driving that attempt writes to it.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutContext {
    id: CheckoutId,
    user_id: UserId,
    started_at: DateTime<Utc>,
    cart: CartSnapshot,
    shipping: Option<ShippingChoice>,
    shipping_cost: Money,
    payment: Option<PaymentChoice>,
    authorization: Option<String>,
    folio: Option<Folio>,
    order_id: Option<OrderId>,
}

impl CheckoutContext {
    pub(crate) fn new(user_id: UserId, cart: CartSnapshot) -> Self {
        Self {
            id: CheckoutId::new(),
            user_id,
            started_at: Utc::now(),
            cart,
            shipping: None,
            shipping_cost: Money::ZERO,
            payment: None,
            authorization: None,
            folio: None,
            order_id: None,
        }
    }

    pub fn id(&self) -> CheckoutId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The cart as it was charged.
    pub fn cart(&self) -> &CartSnapshot {
        &self.cart
    }

    pub fn shipping(&self) -> Option<&ShippingChoice> {
        self.shipping.as_ref()
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn payment(&self) -> Option<PaymentChoice> {
        self.payment
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn folio(&self) -> Option<&Folio> {
        self.folio.as_ref()
    }

    /// Set only when the order was stored.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Cart total plus shipping.
    pub fn grand_total(&self) -> Money {
        self.cart.total + self.shipping_cost
    }

    pub(crate) fn set_cart(&mut self, cart: CartSnapshot) {
        self.cart = cart;
    }

    pub(crate) fn set_shipping(&mut self, quote: ShippingQuote) {
        self.shipping = Some(quote.choice);
        self.shipping_cost = quote.cost;
    }

    pub(crate) fn set_payment(&mut self, payment: PaymentChoice) {
        self.payment = Some(payment);
    }

    pub(crate) fn set_authorization(&mut self, authorization: String) {
        self.authorization = Some(authorization);
    }

    pub(crate) fn set_folio(&mut self, folio: Folio) {
        self.folio = Some(folio);
    }

    pub(crate) fn set_order_id(&mut self, order_id: OrderId) {
        self.order_id = Some(order_id);
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::{Product, SharedCart};

    use super::*;

    async fn snapshot() -> CartSnapshot {
        let cart = SharedCart::new();
        let p = Product::new(ProductId::new(1), "Rice", Money::from_units(100), "Food", 5).unwrap();
        cart.add_item(&p).await;
        cart.snapshot().await
    }

    #[tokio::test]
    async fn test_grand_total_includes_shipping() {
        let mut ctx = CheckoutContext::new(UserId::new(1), snapshot().await);
        assert_eq!(ctx.grand_total(), Money::from_units(100));

        ctx.set_shipping(ShippingQuote {
            choice: ShippingChoice::home("Av. Juarez 120, Col. Centro"),
            cost: Money::from_units(50),
        });
        assert_eq!(ctx.grand_total(), Money::from_units(150));
        assert_eq!(ctx.shipping_cost(), Money::from_units(50));
    }

    #[tokio::test]
    async fn test_each_attempt_gets_its_own_id() {
        let cart = snapshot().await;
        let a = CheckoutContext::new(UserId::new(1), cart.clone());
        let b = CheckoutContext::new(UserId::new(1), cart);
        assert_ne!(a.id(), b.id());
        assert!(a.folio().is_none());
        assert!(a.order_id().is_none());
    }
}
