use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use domain::{CartSnapshot, DiscountRate, SharedCart, pricing};
use tokio::sync::Mutex;

use crate::{Identity, PriceRecalculator, Result, Worker};

/// An out-of-band promotion that replaces the tier table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomDiscount {
    pub rate: DiscountRate,
    pub label: String,
}

/// Applies the tiered discount whenever the cart changes.
///
/// The discount is always computed from the pristine subtotal and replaces
/// the previous one. It is only written when the amount differs from the
/// discount already on the cart, so a reset or a skipped revision is
/// corrected on the next evaluation.
pub struct DiscountEngine {
    cart: SharedCart,
    recalculator: Arc<PriceRecalculator>,
    custom: Mutex<Option<CustomDiscount>>,
}

impl DiscountEngine {
    pub fn new(cart: SharedCart, recalculator: Arc<PriceRecalculator>) -> Self {
        Self {
            cart,
            recalculator,
            custom: Mutex::new(None),
        }
    }

    /// Brings the cart discount in line with the current subtotal. Returns
    /// the applied amount when the cart was updated.
    pub async fn evaluate(&self) -> Option<Money> {
        let snapshot = self.cart.snapshot().await;
        let (amount, label) = match self.custom.lock().await.as_ref() {
            Some(custom) => (custom.rate.of(snapshot.subtotal), custom.label.clone()),
            None => match pricing::tier_for(snapshot.subtotal) {
                Some(tier) => (tier.rate.of(snapshot.subtotal), tier.label.to_string()),
                None => (Money::ZERO, "no discount".to_string()),
            },
        };

        if amount == snapshot.discount {
            return None;
        }
        self.apply(amount, &label, &snapshot).await;
        Some(amount)
    }

    async fn apply(&self, amount: Money, label: &str, read: &CartSnapshot) {
        self.cart.apply_discount(amount).await;
        metrics::counter!("discounts_applied_total").increment(1);
        tracing::info!(
            subtotal = %read.subtotal,
            discount = %amount,
            label = %label,
            "discount applied"
        );
        self.recalculator.force_recalculate().await;
    }

    /// Applies `rate` regardless of the tier table and keeps using it for
    /// later subtotal changes until [`clear_discounts`](Self::clear_discounts).
    pub async fn apply_custom_discount(
        &self,
        rate: DiscountRate,
        label: impl Into<String>,
    ) -> CartSnapshot {
        let label = label.into();
        let subtotal = self.cart.subtotal().await;
        let amount = rate.of(subtotal);
        *self.custom.lock().await = Some(CustomDiscount {
            rate,
            label: label.clone(),
        });

        self.cart.apply_discount(amount).await;
        metrics::counter!("discounts_applied_total").increment(1);
        tracing::info!(%subtotal, discount = %amount, %rate, label = %label, "custom discount applied");
        self.recalculator.force_recalculate().await
    }

    /// Drops a custom promotion and puts the tier discount back on the cart.
    pub async fn clear_discounts(&self) -> CartSnapshot {
        *self.custom.lock().await = None;
        tracing::info!("custom discount cleared");
        self.evaluate().await;
        self.recalculator.force_recalculate().await
    }

    /// Brings the discount up to date and returns the resulting cart.
    pub async fn settled_snapshot(&self) -> CartSnapshot {
        self.evaluate().await;
        self.cart.snapshot().await
    }

    pub async fn custom_discount(&self) -> Option<CustomDiscount> {
        self.custom.lock().await.clone()
    }
}

#[async_trait]
impl Worker for DiscountEngine {
    fn name(&self) -> &'static str {
        "discount-engine"
    }

    async fn run_active(&self, _identity: &Identity) -> Result<()> {
        let mut revisions = self.cart.subscribe();
        loop {
            self.evaluate().await;
            if revisions.changed().await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::Product;

    use super::*;

    fn engine(cart: &SharedCart) -> DiscountEngine {
        let recalculator = Arc::new(PriceRecalculator::new(
            cart.clone(),
            Arc::new(|_: &CartSnapshot| {}),
        ));
        DiscountEngine::new(cart.clone(), recalculator)
    }

    fn product(id: i64, cents: i64) -> Product {
        Product::new(ProductId::new(id), "Item", Money::from_cents(cents), "Test", 1).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_tier_discount() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        let a = product(1, 30_000);
        cart.add_item(&a).await;
        cart.add_item(&a).await;
        cart.add_item(&product(2, 5_000)).await;

        assert_eq!(engine.evaluate().await, Some(Money::from_units(65)));

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.subtotal, Money::from_units(650));
        assert_eq!(snapshot.discount, Money::from_units(65));
        assert_eq!(snapshot.total, Money::from_units(585));
    }

    #[tokio::test]
    async fn test_no_write_when_subtotal_unchanged() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        cart.add_item(&product(1, 60_000)).await;

        assert!(engine.evaluate().await.is_some());
        let revision = cart.revision();
        assert!(engine.evaluate().await.is_none());
        assert_eq!(cart.revision(), revision);
    }

    #[tokio::test]
    async fn test_discount_follows_subtotal_down() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        let big = product(1, 120_000);
        let small = product(2, 1_000);
        cart.add_item(&big).await;
        cart.add_item(&small).await;
        engine.evaluate().await;
        assert_eq!(cart.snapshot().await.discount, Money::from_cents(18_150));

        cart.remove_item(big.id).await;
        engine.evaluate().await;

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.discount, Money::ZERO);
        assert_eq!(snapshot.total, Money::from_units(10));
    }

    #[tokio::test]
    async fn test_reapplies_after_cart_cleared() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        let item = product(1, 65_000);

        cart.add_item(&item).await;
        engine.evaluate().await;
        cart.clear().await;
        engine.evaluate().await;
        cart.add_item(&item).await;
        engine.evaluate().await;

        assert_eq!(cart.snapshot().await.discount, Money::from_units(65));
    }

    #[tokio::test]
    async fn test_settled_snapshot_after_reset_to_same_subtotal() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        let a = product(1, 30_000);
        let b = product(2, 5_000);
        cart.add_item(&a).await;
        cart.add_item(&a).await;
        cart.add_item(&b).await;
        engine.evaluate().await;

        cart.clear().await;
        cart.add_item(&a).await;
        cart.add_item(&a).await;
        cart.add_item(&b).await;

        let snapshot = engine.settled_snapshot().await;
        assert_eq!(snapshot.discount, Money::from_units(65));
        assert_eq!(snapshot.total, Money::from_units(585));
    }

    #[tokio::test]
    async fn test_clearing_promo_restores_tier_discount() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        cart.add_item(&product(1, 65_000)).await;
        engine
            .apply_custom_discount(DiscountRate::from_percent(50), "staff")
            .await;

        let snapshot = engine.clear_discounts().await;

        assert_eq!(snapshot.discount, Money::from_units(65));
        assert_eq!(snapshot.total, Money::from_units(585));
    }

    #[tokio::test]
    async fn test_custom_discount_overrides_tiers_until_cleared() {
        let cart = SharedCart::new();
        let engine = engine(&cart);
        cart.add_item(&product(1, 10_000)).await;

        let snapshot = engine
            .apply_custom_discount(DiscountRate::from_percent(50), "staff")
            .await;
        assert_eq!(snapshot.discount, Money::from_units(50));

        cart.add_item(&product(2, 10_000)).await;
        engine.evaluate().await;
        assert_eq!(cart.snapshot().await.discount, Money::from_units(100));

        let snapshot = engine.clear_discounts().await;
        assert_eq!(snapshot.discount, Money::ZERO);
        assert!(engine.custom_discount().await.is_none());
    }

    #[tokio::test]
    async fn test_worker_converges_after_mutation() {
        let cart = SharedCart::new();
        let engine = Arc::new(engine(&cart));
        let identity = Identity {
            user_id: common::UserId::new(1),
            username: "ana".to_string(),
        };
        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_active(&identity).await }
        });

        cart.add_item(&product(1, 250_000)).await;

        let mut revisions = cart.subscribe();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while cart.snapshot().await.discount != Money::from_units(500) {
                revisions.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        task.abort();
    }
}
