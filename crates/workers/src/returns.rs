use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::{Folio, NewReturn, Return, ReturnReason, ReturnStatus};
use store::{OrderRepository, ReturnRepository};

use crate::{Identity, Result, SessionGate, Worker, WorkerError};

/// Return requests for the signed-in user's orders.
pub struct ReturnsService {
    returns: Arc<dyn ReturnRepository>,
    orders: Arc<dyn OrderRepository>,
    gate: SessionGate,
    processing_delay: Duration,
}

impl ReturnsService {
    pub fn new(
        returns: Arc<dyn ReturnRepository>,
        orders: Arc<dyn OrderRepository>,
        gate: SessionGate,
        processing_delay: Duration,
    ) -> Self {
        Self {
            returns,
            orders,
            gate,
            processing_delay,
        }
    }

    fn identity(&self) -> Result<Identity> {
        self.gate.identity().ok_or(WorkerError::NotAuthenticated)
    }

    /// Files a return against one of the user's orders and processes it.
    ///
    /// The request is stored as `PENDING`, then marked `PROCESSED` after the
    /// processing delay. A failure to store the request is returned; a
    /// failure to update its status is logged and the pending return is
    /// returned as is.
    #[tracing::instrument(skip(self, note))]
    pub async fn request_return(
        &self,
        folio: &Folio,
        reason: ReturnReason,
        amount: Money,
        note: &str,
    ) -> Result<Return> {
        let identity = self.identity()?;
        let order = self
            .orders
            .find_by_folio(folio)
            .await?
            .filter(|order| order.user_id == identity.user_id)
            .ok_or_else(|| WorkerError::OrderNotFound(folio.to_string()))?;

        let request = NewReturn::new(
            identity.user_id,
            order.id,
            order.folio.clone(),
            reason,
            amount,
            order.grand_total(),
            note,
        )?;
        let mut ret = self.returns.save(request).await?;
        metrics::counter!("returns_registered_total").increment(1);
        tracing::info!(return_id = %ret.id, %amount, "return registered");

        tokio::time::sleep(self.processing_delay).await;

        match self.returns.update_status(ret.id, ReturnStatus::Processed).await {
            Ok(true) => ret.status = ReturnStatus::Processed,
            Ok(false) => tracing::warn!(return_id = %ret.id, "return vanished before processing"),
            Err(e) => tracing::warn!(return_id = %ret.id, error = %e, "could not mark return processed"),
        }
        Ok(ret)
    }

    /// Returns of the current user, newest first.
    pub async fn returns(&self) -> Result<Vec<Return>> {
        let identity = self.identity()?;
        Ok(self.returns.find_by_user(identity.user_id).await?)
    }
}

#[async_trait]
impl Worker for ReturnsService {
    fn name(&self) -> &'static str {
        "returns-service"
    }

    async fn run_active(&self, identity: &Identity) -> Result<()> {
        match self.returns.find_by_user(identity.user_id).await {
            Ok(returns) => {
                let pending = returns
                    .iter()
                    .filter(|r| r.status == ReturnStatus::Pending)
                    .count();
                tracing::info!(returns = returns.len(), pending, "returns service ready");
            }
            Err(e) => tracing::warn!(error = %e, "could not load returns"),
        }
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use common::{ProductId, UserId};
    use domain::{NewOrder, Order, Product, SharedCart, ShippingChoice};
    use store::InMemoryStore;

    use super::*;

    struct Fixture {
        store: InMemoryStore,
        gate: SessionGate,
        service: ReturnsService,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let gate = SessionGate::new();
        gate.open(Identity {
            user_id: UserId::new(1),
            username: "ana".to_string(),
        });
        let service = ReturnsService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            gate.clone(),
            Duration::ZERO,
        );
        Fixture {
            store,
            gate,
            service,
        }
    }

    async fn place_order(store: &InMemoryStore, user: i64, folio: &str) -> Order {
        let cart = SharedCart::new();
        cart.add_item(
            &Product::new(ProductId::new(1), "Milk", Money::from_units(40), "Dairy", 9).unwrap(),
        )
        .await;
        let order = NewOrder::from_snapshot(
            UserId::new(user),
            Folio::new(folio),
            &cart.snapshot().await,
            &ShippingChoice::pickup(),
            Money::from_units(50),
        )
        .unwrap();
        OrderRepository::save(store, order).await.unwrap()
    }

    #[tokio::test]
    async fn test_return_is_processed() {
        let f = fixture();
        let order = place_order(&f.store, 1, "ORD-1").await;

        let ret = f
            .service
            .request_return(&order.folio, ReturnReason::Expired, Money::from_units(40), "sour")
            .await
            .unwrap();

        assert_eq!(ret.status, ReturnStatus::Processed);
        assert_eq!(ret.order_id, order.id);
        let listed = f.service.returns().await.unwrap();
        assert_eq!(listed[0].status, ReturnStatus::Processed);
    }

    #[tokio::test]
    async fn test_refund_limited_to_grand_total() {
        let f = fixture();
        let order = place_order(&f.store, 1, "ORD-1").await;

        // Grand total is 40 + 50 shipping.
        let err = f
            .service
            .request_return(&order.folio, ReturnReason::Damaged, Money::from_units(91), "")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let f = fixture();
        let order = place_order(&f.store, 2, "ORD-2").await;

        let err = f
            .service
            .request_return(&order.folio, ReturnReason::WrongCharge, Money::from_units(1), "")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let f = fixture();
        let order = place_order(&f.store, 1, "ORD-1").await;
        f.store.set_fail_on_return_save(true);

        let err = f
            .service
            .request_return(&order.folio, ReturnReason::Damaged, Money::from_units(1), "")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_status_update_failure_leaves_pending() {
        let f = fixture();
        let order = place_order(&f.store, 1, "ORD-1").await;
        f.store.set_fail_on_return_update(true);

        let ret = f
            .service
            .request_return(&order.folio, ReturnReason::Damaged, Money::from_units(1), "")
            .await
            .unwrap();
        assert_eq!(ret.status, ReturnStatus::Pending);
    }

    #[tokio::test]
    async fn test_requires_session() {
        let f = fixture();
        f.gate.close();
        assert!(matches!(
            f.service.returns().await,
            Err(WorkerError::NotAuthenticated)
        ));
    }
}
