use async_trait::async_trait;
use common::{CardId, Money, OrderId, ProductId, ReturnId, UserId};
use domain::{
    Card, Expiry, Folio, NewCard, NewOrder, NewReturn, Order, OrderLine, PaymentRecord, Product,
    Return, ReturnStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    CardRepository, OrderRepository, ProductCatalog, Result, ReturnRepository, StoreError,
    UserDirectory,
};

const ORDER_COLUMNS: &str = "id, user_id, folio, created_at, subtotal_cents, discount_cents, \
     shipping_mode, shipping_address, shipping_cost_cents, status, lines";

const CARD_COLUMNS: &str = "id, user_id, last4, holder, expiry, brand, active";

const RETURN_COLUMNS: &str =
    "id, user_id, order_id, folio, reason, status, amount_cents, note, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts catalog entries, leaving existing ids untouched.
    pub async fn seed_products(&self, products: &[Product]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, price_cents, category, stock)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(product.id.get())
            .bind(&product.name)
            .bind(product.price.cents())
            .bind(&product.category)
            .bind(i32::try_from(product.stock).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }
        // Keep the sequence ahead of explicitly inserted ids.
        sqlx::query(
            "SELECT setval(pg_get_serial_sequence('products', 'id'), COALESCE(MAX(id), 1)) FROM products",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let stock: i32 = row.try_get("stock")?;
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            category: row.try_get("category")?,
            stock: u32::try_from(stock).unwrap_or(0),
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let lines: serde_json::Value = row.try_get("lines")?;
        let lines: Vec<OrderLine> = serde_json::from_value(lines)?;
        let shipping_mode: String = row.try_get("shipping_mode")?;
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            folio: Folio::new(row.try_get::<String, _>("folio")?),
            created_at: row.try_get("created_at")?,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            discount: Money::from_cents(row.try_get("discount_cents")?),
            shipping_mode: shipping_mode.parse()?,
            shipping_address: row.try_get("shipping_address")?,
            shipping_cost: Money::from_cents(row.try_get("shipping_cost_cents")?),
            status: status.parse()?,
            lines,
        })
    }

    fn row_to_card(row: PgRow) -> Result<Card> {
        let expiry: String = row.try_get("expiry")?;
        let brand: String = row.try_get("brand")?;

        Ok(Card {
            id: CardId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            last4: row.try_get("last4")?,
            holder: row.try_get("holder")?,
            expiry: Expiry::parse(&expiry)?,
            brand: brand.parse()?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_return(row: PgRow) -> Result<Return> {
        let reason: String = row.try_get("reason")?;
        let status: String = row.try_get("status")?;

        Ok(Return {
            id: ReturnId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            folio: Folio::new(row.try_get::<String, _>("folio")?),
            reason: reason.parse()?,
            status: status.parse()?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn validate_credentials(&self, username: &str, password: &str) -> Result<bool> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT password FROM users WHERE username = $1")
                .bind(username.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(stored.is_some_and(|stored| stored == password))
    }

    async fn register(&self, username: &str, password: &str) -> Result<UserId> {
        let username = username.trim();
        let id: i64 =
            sqlx::query_scalar("INSERT INTO users (username, password) VALUES ($1, $2) RETURNING id")
                .bind(username)
                .bind(password)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e, "users_username_key") {
                        return StoreError::Conflict(format!(
                            "username '{username}' already exists"
                        ));
                    }
                    StoreError::Database(e)
                })?;
        Ok(UserId::new(id))
    }

    async fn find_id(&self, username: &str) -> Result<Option<UserId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id.map(UserId::new))
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn list_categories(&self) -> Result<Vec<String>> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM products ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, category, stock
            FROM products
            WHERE LOWER(category) = LOWER($1)
            ORDER BY id
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, category, stock FROM products WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        let rows =
            sqlx::query("SELECT id, name, price_cents, category, stock FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(folio = %order.folio))]
    async fn save(&self, order: NewOrder) -> Result<Order> {
        let lines = serde_json::to_value(&order.lines)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, folio, created_at, subtotal_cents, discount_cents,
                                shipping_mode, shipping_address, shipping_cost_cents, status, lines)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(order.user_id.get())
        .bind(order.folio.as_str())
        .bind(order.created_at)
        .bind(order.subtotal.cents())
        .bind(order.discount.cents())
        .bind(order.shipping_mode.as_str())
        .bind(order.shipping_address.as_deref())
        .bind(order.shipping_cost.cents())
        .bind(order.status.as_str())
        .bind(lines)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "unique_order_folio") {
                return StoreError::Conflict(format!("folio {} already exists", order.folio));
            }
            StoreError::Database(e)
        })?;

        tracing::debug!(order_id = id, "order stored");
        Ok(order.into_order(OrderId::new(id)))
    }

    async fn save_payment(&self, payment: PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (order_id, method, card_id, amount_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(payment.order_id.get())
        .bind(payment.method.as_str())
        .bind(payment.card_id.map(|id| id.get()))
        .bind(payment.amount.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_folio(&self, folio: &Folio) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE folio = $1"
        ))
        .bind(folio.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_payment(&self, order_id: OrderId) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            "SELECT order_id, method, card_id, amount_cents FROM payments WHERE order_id = $1",
        )
        .bind(order_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let method: String = row.try_get("method")?;
        let card_id: Option<i64> = row.try_get("card_id")?;
        Ok(Some(PaymentRecord {
            order_id: OrderId::new(row.try_get("order_id")?),
            method: method.parse()?,
            card_id: card_id.map(CardId::new),
            amount: Money::from_cents(row.try_get("amount_cents")?),
        }))
    }
}

#[async_trait]
impl CardRepository for PostgresStore {
    async fn save(&self, card: NewCard) -> Result<Card> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cards (user_id, last4, holder, expiry, brand)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(card.user_id.get())
        .bind(card.number.last4())
        .bind(&card.holder)
        .bind(card.expiry.to_string())
        .bind(card.brand.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_card(row)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Card>> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_card).collect()
    }

    async fn find_by_id(&self, id: CardId) -> Result<Option<Card>> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_card).transpose()
    }

    async fn deactivate(&self, id: CardId) -> Result<bool> {
        let result = sqlx::query("UPDATE cards SET active = FALSE WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ReturnRepository for PostgresStore {
    async fn save(&self, request: NewReturn) -> Result<Return> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO returns (user_id, order_id, folio, reason, status, amount_cents, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RETURN_COLUMNS}
            "#
        ))
        .bind(request.user_id.get())
        .bind(request.order_id.get())
        .bind(request.folio.as_str())
        .bind(request.reason.as_str())
        .bind(ReturnStatus::Pending.as_str())
        .bind(request.amount.cents())
        .bind(&request.note)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_return(row)
    }

    async fn update_status(&self, id: ReturnId, status: ReturnStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE returns SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Return>> {
        let rows = sqlx::query(&format!(
            "SELECT {RETURN_COLUMNS} FROM returns WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_return).collect()
    }
}
