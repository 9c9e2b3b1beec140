use std::sync::Arc;

use async_trait::async_trait;
use common::{CardId, OrderId, ProductId, ReturnId, UserId};
use domain::{
    Card, Folio, NewCard, NewOrder, NewReturn, Order, PaymentRecord, Product, Return,
    ReturnStatus,
};

use crate::Result;

/// Credential store behind the login step.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns true if the username exists and the password matches.
    async fn validate_credentials(&self, username: &str, password: &str) -> Result<bool>;

    /// Creates a user.
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) if the
    /// username is taken.
    async fn register(&self, username: &str, password: &str) -> Result<UserId>;

    /// Resolves a username to its numeric id.
    async fn find_id(&self, username: &str) -> Result<Option<UserId>>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Distinct categories, sorted.
    async fn list_categories(&self) -> Result<Vec<String>>;

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>>;

    /// All products ordered by id.
    async fn list_all(&self) -> Result<Vec<Product>>;
}

/// Orders and the payment records tied to them.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists an order and returns it with its assigned id.
    ///
    /// A folio that already exists is a
    /// [`StoreError::Conflict`](crate::StoreError::Conflict).
    async fn save(&self, order: NewOrder) -> Result<Order>;

    /// Persists the payment record of an order.
    async fn save_payment(&self, payment: PaymentRecord) -> Result<()>;

    async fn find_by_folio(&self, folio: &Folio) -> Result<Option<Order>>;

    /// Orders of a user, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    async fn find_payment(&self, order_id: OrderId) -> Result<Option<PaymentRecord>>;
}

/// Registered payment cards.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Persists a card. Only the last four digits of the number are stored.
    async fn save(&self, card: NewCard) -> Result<Card>;

    /// Cards of a user (active and inactive), ordered by id.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Card>>;

    async fn find_by_id(&self, id: CardId) -> Result<Option<Card>>;

    /// Marks a card inactive. Returns false if no such card exists.
    async fn deactivate(&self, id: CardId) -> Result<bool>;
}

/// Return requests.
#[async_trait]
pub trait ReturnRepository: Send + Sync {
    async fn save(&self, request: NewReturn) -> Result<Return>;

    /// Returns false if no such return exists.
    async fn update_status(&self, id: ReturnId, status: ReturnStatus) -> Result<bool>;

    /// Returns of a user, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Return>>;
}

/// The full set of persistence collaborators, as trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub orders: Arc<dyn OrderRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub returns: Arc<dyn ReturnRepository>,
}

impl Repositories {
    /// Uses one backing store for every collaborator.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserDirectory
            + ProductCatalog
            + OrderRepository
            + CardRepository
            + ReturnRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            catalog: store.clone(),
            orders: store.clone(),
            cards: store.clone(),
            returns: store,
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
