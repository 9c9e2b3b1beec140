use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CardId, OrderId, ProductId, ReturnId, UserId};
use domain::{
    Card, Folio, NewCard, NewOrder, NewReturn, Order, PaymentRecord, Product, Return,
    ReturnStatus,
};
use tokio::sync::RwLock;

use crate::{
    CardRepository, OrderRepository, ProductCatalog, Result, ReturnRepository, StoreError,
    UserDirectory,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, (UserId, String)>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    payments: HashMap<OrderId, PaymentRecord>,
    cards: BTreeMap<CardId, Card>,
    returns: BTreeMap<ReturnId, Return>,
    next_user: i64,
    next_order: i64,
    next_card: i64,
    next_return: i64,
}

#[derive(Debug, Default)]
struct Failures {
    unavailable: AtomicBool,
    order_save: AtomicBool,
    payment_save: AtomicBool,
    card_save: AtomicBool,
    return_save: AtomicBool,
    return_update: AtomicBool,
}

/// In-memory store implementation.
///
/// Used by the binary when no database is configured and by tests. Each
/// write path can be made to fail with [`StoreError::Unavailable`] to
/// exercise error handling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    failures: Arc<Failures>,
}

fn check(flag: &AtomicBool, what: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable(format!("{what} failed")));
    }
    Ok(())
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog holds `products`.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        store.add_products(products).await;
        store
    }

    /// Inserts or replaces catalog entries.
    pub async fn add_products(&self, products: impl IntoIterator<Item = Product>) {
        let mut state = self.state.write().await;
        for product in products {
            state.products.insert(product.id, product);
        }
    }

    /// Makes every operation fail.
    pub fn set_unavailable(&self, fail: bool) {
        self.failures.unavailable.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_order_save(&self, fail: bool) {
        self.failures.order_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_payment_save(&self, fail: bool) {
        self.failures.payment_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_card_save(&self, fail: bool) {
        self.failures.card_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_return_save(&self, fail: bool) {
        self.failures.return_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_return_update(&self, fail: bool) {
        self.failures.return_update.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored payment records.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    fn available(&self) -> Result<()> {
        check(&self.failures.unavailable, "store")
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn validate_credentials(&self, username: &str, password: &str) -> Result<bool> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state
            .users
            .get(username.trim())
            .is_some_and(|(_, stored)| stored == password))
    }

    async fn register(&self, username: &str, password: &str) -> Result<UserId> {
        self.available()?;
        let username = username.trim();
        let mut state = self.state.write().await;
        if state.users.contains_key(username) {
            return Err(StoreError::Conflict(format!(
                "username '{username}' already exists"
            )));
        }
        state.next_user += 1;
        let id = UserId::new(state.next_user);
        state
            .users
            .insert(username.to_string(), (id, password.to_string()));
        Ok(id)
    }

    async fn find_id(&self, username: &str) -> Result<Option<UserId>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state.users.get(username.trim()).map(|(id, _)| *id))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<String>> {
        self.available()?;
        let state = self.state.read().await;
        let categories: BTreeSet<&String> =
            state.products.values().map(|p| &p.category).collect();
        Ok(categories.into_iter().cloned().collect())
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| p.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        self.available()?;
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        self.available()?;
        Ok(self.state.read().await.products.values().cloned().collect())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn save(&self, order: NewOrder) -> Result<Order> {
        self.available()?;
        check(&self.failures.order_save, "order save")?;

        let mut state = self.state.write().await;
        if state.orders.values().any(|o| o.folio == order.folio) {
            return Err(StoreError::Conflict(format!(
                "folio {} already exists",
                order.folio
            )));
        }
        state.next_order += 1;
        let order = order.into_order(OrderId::new(state.next_order));
        state.orders.insert(order.id, order.clone());
        tracing::debug!(order_id = %order.id, folio = %order.folio, "order stored");
        Ok(order)
    }

    async fn save_payment(&self, payment: PaymentRecord) -> Result<()> {
        self.available()?;
        check(&self.failures.payment_save, "payment save")?;

        let mut state = self.state.write().await;
        if !state.orders.contains_key(&payment.order_id) {
            return Err(StoreError::NotFound {
                entity: "order",
                id: payment.order_id.to_string(),
            });
        }
        state.payments.insert(payment.order_id, payment);
        Ok(())
    }

    async fn find_by_folio(&self, folio: &Folio) -> Result<Option<Order>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state.orders.values().find(|o| &o.folio == folio).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_payment(&self, order_id: OrderId) -> Result<Option<PaymentRecord>> {
        self.available()?;
        Ok(self.state.read().await.payments.get(&order_id).cloned())
    }
}

#[async_trait]
impl CardRepository for InMemoryStore {
    async fn save(&self, card: NewCard) -> Result<Card> {
        self.available()?;
        check(&self.failures.card_save, "card save")?;

        let mut state = self.state.write().await;
        state.next_card += 1;
        let card = Card {
            id: CardId::new(state.next_card),
            user_id: card.user_id,
            last4: card.number.last4().to_string(),
            holder: card.holder,
            expiry: card.expiry,
            brand: card.brand,
            active: true,
        };
        state.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Card>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: CardId) -> Result<Option<Card>> {
        self.available()?;
        Ok(self.state.read().await.cards.get(&id).cloned())
    }

    async fn deactivate(&self, id: CardId) -> Result<bool> {
        self.available()?;
        let mut state = self.state.write().await;
        Ok(match state.cards.get_mut(&id) {
            Some(card) => {
                card.active = false;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl ReturnRepository for InMemoryStore {
    async fn save(&self, request: NewReturn) -> Result<Return> {
        self.available()?;
        check(&self.failures.return_save, "return save")?;

        let mut state = self.state.write().await;
        state.next_return += 1;
        let ret = request.into_return(ReturnId::new(state.next_return));
        state.returns.insert(ret.id, ret.clone());
        Ok(ret)
    }

    async fn update_status(&self, id: ReturnId, status: ReturnStatus) -> Result<bool> {
        self.available()?;
        check(&self.failures.return_update, "return update")?;

        let mut state = self.state.write().await;
        Ok(match state.returns.get_mut(&id) {
            Some(ret) => {
                ret.status = status;
                true
            }
            None => false,
        })
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Return>> {
        self.available()?;
        let state = self.state.read().await;
        Ok(state
            .returns
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::{CardBrand, ReturnReason, ShippingChoice, SharedCart};

    use super::*;

    fn product(id: i64, category: &str) -> Product {
        Product::new(
            ProductId::new(id),
            format!("P{id}"),
            Money::from_units(10),
            category,
            5,
        )
        .unwrap()
    }

    async fn new_order(user: UserId, folio: &str) -> NewOrder {
        let cart = SharedCart::new();
        cart.add_item(&product(1, "Food")).await;
        NewOrder::from_snapshot(
            user,
            Folio::new(folio),
            &cart.snapshot().await,
            &ShippingChoice::pickup(),
            Money::ZERO,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_validate() {
        let store = InMemoryStore::new();
        let id = store.register("ana", "secret").await.unwrap();

        assert!(store.validate_credentials("ana", "secret").await.unwrap());
        assert!(!store.validate_credentials("ana", "wrong").await.unwrap());
        assert!(!store.validate_credentials("bob", "secret").await.unwrap());
        assert_eq!(store.find_id("ana").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = InMemoryStore::new();
        store.register("ana", "secret").await.unwrap();
        let err = store.register(" ana ", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let store = InMemoryStore::with_products([
            product(1, "Food"),
            product(2, "Drinks"),
            product(3, "Food"),
        ])
        .await;

        assert_eq!(store.list_categories().await.unwrap(), vec!["Drinks", "Food"]);
        assert_eq!(store.list_by_category("food").await.unwrap().len(), 2);
        assert!(
            ProductCatalog::find_by_id(&store, ProductId::new(2))
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_order_save_assigns_ids_and_rejects_duplicate_folio() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);

        let first = OrderRepository::save(&store, new_order(user, "ORD-1").await)
            .await
            .unwrap();
        let second = OrderRepository::save(&store, new_order(user, "ORD-2").await)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let err = OrderRepository::save(&store, new_order(user, "ORD-1").await)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let orders = OrderRepository::find_by_user(&store, user).await.unwrap();
        assert_eq!(orders[0].id, second.id, "newest first");
    }

    #[tokio::test]
    async fn test_payment_requires_existing_order() {
        let store = InMemoryStore::new();
        let err = store
            .save_payment(PaymentRecord::new(OrderId::new(9), None, Money::from_units(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fail_on_order_save() {
        let store = InMemoryStore::new();
        store.set_fail_on_order_save(true);

        let result = OrderRepository::save(&store, new_order(UserId::new(1), "ORD-1").await).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_card_keeps_only_last_four() {
        let store = InMemoryStore::new();
        let card = NewCard::new(
            UserId::new(1),
            "4111 1111 1111 1234",
            "Ana",
            "10/30",
            CardBrand::Visa,
        )
        .unwrap();

        let saved = CardRepository::save(&store, card).await.unwrap();
        assert_eq!(saved.last4, "1234");
        assert!(saved.active);

        assert!(store.deactivate(saved.id).await.unwrap());
        assert!(!store.deactivate(CardId::new(99)).await.unwrap());
        let found = CardRepository::find_by_id(&store, saved.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!found.active);
    }

    #[tokio::test]
    async fn test_return_status_update() {
        let store = InMemoryStore::new();
        let request = NewReturn::new(
            UserId::new(1),
            OrderId::new(1),
            Folio::new("ORD-1"),
            ReturnReason::Expired,
            Money::from_units(5),
            Money::from_units(10),
            "",
        )
        .unwrap();

        let ret = ReturnRepository::save(&store, request).await.unwrap();
        assert!(store.update_status(ret.id, ReturnStatus::Processed).await.unwrap());
        assert!(!store.update_status(ReturnId::new(42), ReturnStatus::Processed).await.unwrap());

        let returns = ReturnRepository::find_by_user(&store, UserId::new(1))
            .await
            .unwrap();
        assert_eq!(returns[0].status, ReturnStatus::Processed);
    }

    #[tokio::test]
    async fn test_unavailable_fails_reads() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(store.list_all().await.is_err());
        assert!(store.find_id("ana").await.is_err());
    }
}
