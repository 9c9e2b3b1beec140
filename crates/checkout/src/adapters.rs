//! Port implementations backed by the session workers.

use std::sync::Arc;

use async_trait::async_trait;
use common::{CardId, Money};
use domain::{
    Card, CartSnapshot, DomainError, Folio, NewOrder, Order, PaymentRecord, SharedCart,
    ShippingChoice, ShippingPolicy,
};
use workers::{
    CardService, ChargeReceipt, DiscountEngine, PurchaseHistory, Services, SessionSupervisor,
};

use crate::config::CheckoutConfig;
use crate::error::Result;
use crate::ports::{
    CardCharger, CartAccess, OrderPersister, ReceiptRenderer, SessionControl, ShippingPricer,
    ShippingQuote,
};
use crate::receipt::TextReceipt;

impl ShippingPricer for ShippingPolicy {
    fn quote(
        &self,
        choice: ShippingChoice,
        subtotal: Money,
    ) -> std::result::Result<ShippingQuote, DomainError> {
        let choice = self.validate(choice)?;
        let cost = self.cost(subtotal, choice.mode);
        Ok(ShippingQuote { choice, cost })
    }
}

#[async_trait]
impl CartAccess for SharedCart {
    async fn settle(&self) -> CartSnapshot {
        self.snapshot().await
    }

    async fn clear(&self) {
        SharedCart::clear(self).await;
    }
}

/// The shared cart with the discount engine brought up to date before
/// every read.
pub struct SettledCart {
    cart: SharedCart,
    discounts: Arc<DiscountEngine>,
}

impl SettledCart {
    pub fn new(cart: SharedCart, discounts: Arc<DiscountEngine>) -> Self {
        Self { cart, discounts }
    }
}

#[async_trait]
impl CartAccess for SettledCart {
    async fn settle(&self) -> CartSnapshot {
        self.discounts.settled_snapshot().await
    }

    async fn clear(&self) {
        self.cart.clear().await;
    }
}

#[async_trait]
impl CardCharger for CardService {
    async fn available_cards(&self) -> Result<Vec<Card>> {
        Ok(self.list_cards().await?)
    }

    async fn charge(&self, card_id: CardId, amount: Money) -> Result<ChargeReceipt> {
        Ok(CardService::charge(self, card_id, amount).await?)
    }
}

#[async_trait]
impl OrderPersister for PurchaseHistory {
    fn next_folio(&self) -> Folio {
        PurchaseHistory::next_folio(self)
    }

    async fn save_order(&self, order: NewOrder) -> Result<Order> {
        Ok(self.record(order).await?)
    }

    async fn save_payment(&self, payment: PaymentRecord) -> Result<()> {
        Ok(self.record_payment(payment).await?)
    }
}

impl SessionControl for SessionSupervisor {
    fn end_session(&self) -> bool {
        SessionSupervisor::end_session(self)
    }
}

/// Every collaborator the orchestrator drives.
#[derive(Clone)]
pub struct CheckoutPorts {
    pub cart: Arc<dyn CartAccess>,
    pub shipping: Arc<dyn ShippingPricer>,
    pub cards: Arc<dyn CardCharger>,
    pub orders: Arc<dyn OrderPersister>,
    pub receipts: Arc<dyn ReceiptRenderer>,
    pub session: Arc<dyn SessionControl>,
}

impl CheckoutPorts {
    /// Wires the ports to the running session workers.
    pub fn from_services(services: &Services, config: &CheckoutConfig) -> Self {
        Self {
            cart: Arc::new(SettledCart::new(
                services.cart.clone(),
                services.discounts.clone(),
            )),
            shipping: Arc::new(config.shipping),
            cards: services.cards.clone(),
            orders: services.history.clone(),
            receipts: Arc::new(TextReceipt::new(config.store_name.clone())),
            session: services.supervisor.clone(),
        }
    }
}
