use std::sync::Arc;

use async_trait::async_trait;
use domain::{CartFingerprint, CartSnapshot, SharedCart};
use tokio::sync::Mutex;

use crate::{Identity, Result, Worker};

/// Receives the cart totals whenever they change.
pub trait TotalsListener: Send + Sync {
    fn totals_changed(&self, snapshot: &CartSnapshot);
}

impl<F> TotalsListener for F
where
    F: Fn(&CartSnapshot) + Send + Sync,
{
    fn totals_changed(&self, snapshot: &CartSnapshot) {
        self(snapshot)
    }
}

/// Keeps cart totals converged and tells the foreground about changes.
///
/// Wakes on every cart mutation and compares the `(item_count, subtotal)`
/// fingerprint with the last one it saw; only a changed fingerprint
/// triggers a recalculation and notification.
pub struct PriceRecalculator {
    cart: SharedCart,
    listener: Arc<dyn TotalsListener>,
    last_seen: Mutex<Option<CartFingerprint>>,
}

impl PriceRecalculator {
    pub fn new(cart: SharedCart, listener: Arc<dyn TotalsListener>) -> Self {
        Self {
            cart,
            listener,
            last_seen: Mutex::new(None),
        }
    }

    /// Recomputes totals and notifies immediately, regardless of the
    /// fingerprint.
    pub async fn force_recalculate(&self) -> CartSnapshot {
        let snapshot = self.cart.recompute_totals().await;
        *self.last_seen.lock().await = Some(snapshot.fingerprint());

        metrics::counter!("cart_recalculations_total").increment(1);
        tracing::debug!(
            items = snapshot.item_count(),
            subtotal = %snapshot.subtotal,
            discount = %snapshot.discount,
            total = %snapshot.total,
            "cart totals recalculated"
        );
        self.listener.totals_changed(&snapshot);
        snapshot
    }

    /// Recalculates if the cart changed since the last check. Returns the
    /// new snapshot when it did.
    pub async fn check_for_changes(&self) -> Option<CartSnapshot> {
        let current = self.cart.fingerprint().await;
        let changed = *self.last_seen.lock().await != Some(current);
        if changed {
            Some(self.force_recalculate().await)
        } else {
            None
        }
    }
}

#[async_trait]
impl Worker for PriceRecalculator {
    fn name(&self) -> &'static str {
        "price-recalculator"
    }

    async fn run_active(&self, _identity: &Identity) -> Result<()> {
        let mut revisions = self.cart.subscribe();
        loop {
            self.check_for_changes().await;
            if revisions.changed().await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use common::{Money, ProductId};
    use domain::Product;

    use super::*;

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<CartSnapshot>>);

    impl TotalsListener for Recorder {
        fn totals_changed(&self, snapshot: &CartSnapshot) {
            self.0.lock().unwrap().push(snapshot.clone());
        }
    }

    fn product(id: i64, units: i64) -> Product {
        Product::new(ProductId::new(id), "Item", Money::from_units(units), "Test", 1).unwrap()
    }

    #[tokio::test]
    async fn test_notifies_only_on_fingerprint_change() {
        let cart = SharedCart::new();
        let recorder = Arc::new(Recorder::default());
        let worker = PriceRecalculator::new(cart.clone(), recorder.clone());

        assert!(worker.check_for_changes().await.is_some());
        assert!(worker.check_for_changes().await.is_none());

        cart.add_item(&product(1, 20)).await;
        let snapshot = worker.check_for_changes().await.unwrap();
        assert_eq!(snapshot.subtotal, Money::from_units(20));

        // A discount does not change the fingerprint.
        cart.apply_discount(Money::from_units(2)).await;
        assert!(worker.check_for_changes().await.is_none());

        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_force_recalculate_always_notifies() {
        let cart = SharedCart::new();
        let recorder = Arc::new(Recorder::default());
        let worker = PriceRecalculator::new(cart, recorder.clone());

        worker.force_recalculate().await;
        worker.force_recalculate().await;

        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closure_listener() {
        let cart = SharedCart::new();
        let seen = Arc::new(StdMutex::new(None));
        let sink = seen.clone();
        let worker = PriceRecalculator::new(
            cart.clone(),
            Arc::new(move |s: &CartSnapshot| *sink.lock().unwrap() = Some(s.total)),
        );

        cart.add_item(&product(1, 15)).await;
        worker.check_for_changes().await;

        assert_eq!(*seen.lock().unwrap(), Some(Money::from_units(15)));
    }
}
