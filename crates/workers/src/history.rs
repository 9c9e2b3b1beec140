use std::sync::Arc;

use async_trait::async_trait;
use domain::{Folio, FolioGenerator, NewOrder, Order, PaymentRecord};
use store::OrderRepository;

use crate::{Identity, Result, SessionGate, Worker, WorkerError};

/// The signed-in user's orders.
pub struct PurchaseHistory {
    orders: Arc<dyn OrderRepository>,
    gate: SessionGate,
    folios: FolioGenerator,
}

impl PurchaseHistory {
    pub fn new(orders: Arc<dyn OrderRepository>, gate: SessionGate) -> Self {
        Self {
            orders,
            gate,
            folios: FolioGenerator::new(),
        }
    }

    fn identity(&self) -> Result<Identity> {
        self.gate.identity().ok_or(WorkerError::NotAuthenticated)
    }

    /// Issues a folio for a new order.
    pub fn next_folio(&self) -> Folio {
        self.folios.next()
    }

    /// Orders of the current user, newest first.
    pub async fn orders(&self) -> Result<Vec<Order>> {
        let identity = self.identity()?;
        Ok(self.orders.find_by_user(identity.user_id).await?)
    }

    /// Finds an order of the current user. Another user's folio yields `None`.
    pub async fn find_by_folio(&self, folio: &Folio) -> Result<Option<Order>> {
        let identity = self.identity()?;
        let order = self.orders.find_by_folio(folio).await?;
        Ok(order.filter(|order| order.user_id == identity.user_id))
    }

    /// Persists a completed order.
    #[tracing::instrument(skip(self, order), fields(folio = %order.folio))]
    pub async fn record(&self, order: NewOrder) -> Result<Order> {
        let order = self.orders.save(order).await?;
        tracing::info!(order_id = %order.id, total = %order.grand_total(), "order recorded");
        Ok(order)
    }

    /// Persists the payment record of an order.
    pub async fn record_payment(&self, payment: PaymentRecord) -> Result<()> {
        self.orders.save_payment(payment).await?;
        Ok(())
    }

    pub async fn payment_for(&self, order: &Order) -> Result<Option<PaymentRecord>> {
        Ok(self.orders.find_payment(order.id).await?)
    }
}

#[async_trait]
impl Worker for PurchaseHistory {
    fn name(&self) -> &'static str {
        "purchase-history"
    }

    async fn run_active(&self, identity: &Identity) -> Result<()> {
        match self.orders.find_by_user(identity.user_id).await {
            Ok(orders) => tracing::info!(orders = orders.len(), "purchase history loaded"),
            Err(e) => tracing::warn!(error = %e, "could not load purchase history"),
        }
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, ProductId, UserId};
    use domain::{PaymentMethod, Product, SharedCart, ShippingChoice};
    use store::InMemoryStore;

    use super::*;

    fn login(gate: &SessionGate, id: i64) {
        gate.close();
        gate.open(Identity {
            user_id: UserId::new(id),
            username: format!("user{id}"),
        });
    }

    async fn order_for(history: &PurchaseHistory, user: i64) -> NewOrder {
        let cart = SharedCart::new();
        cart.add_item(
            &Product::new(ProductId::new(1), "Rice", Money::from_units(30), "Food", 3).unwrap(),
        )
        .await;
        NewOrder::from_snapshot(
            UserId::new(user),
            history.next_folio(),
            &cart.snapshot().await,
            &ShippingChoice::pickup(),
            Money::ZERO,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_orders_are_scoped_to_user() {
        let store = InMemoryStore::new();
        let gate = SessionGate::new();
        let history = PurchaseHistory::new(Arc::new(store), gate.clone());

        let mine = history.record(order_for(&history, 1).await).await.unwrap();
        let theirs = history.record(order_for(&history, 2).await).await.unwrap();

        login(&gate, 1);
        assert_eq!(history.orders().await.unwrap().len(), 1);
        assert!(history.find_by_folio(&mine.folio).await.unwrap().is_some());
        assert!(history.find_by_folio(&theirs.folio).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requires_session() {
        let history = PurchaseHistory::new(Arc::new(InMemoryStore::new()), SessionGate::new());
        assert!(matches!(
            history.orders().await,
            Err(WorkerError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_payment_record_round_trip() {
        let store = InMemoryStore::new();
        let gate = SessionGate::new();
        let history = PurchaseHistory::new(Arc::new(store), gate.clone());
        login(&gate, 1);

        let order = history.record(order_for(&history, 1).await).await.unwrap();
        history
            .record_payment(PaymentRecord::new(order.id, None, order.grand_total()))
            .await
            .unwrap();

        let payment = history.payment_for(&order).await.unwrap().unwrap();
        assert_eq!(payment.method, PaymentMethod::Cash);
        assert_eq!(payment.amount, Money::from_units(30));
    }
}
