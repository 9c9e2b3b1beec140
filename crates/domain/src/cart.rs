//! The shared shopping cart.
//!
//! A single [`SharedCart`] instance is created per application run and handed
//! (cheaply cloned) to the foreground and every worker. All mutations and
//! aggregate reads go through one `tokio::sync::Mutex`, so no reader ever sees
//! totals computed from a different item set than the one it reads.
//!
//! Every mutation bumps a revision counter published on a `watch` channel;
//! workers await that channel instead of polling.

use std::sync::Arc;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use crate::Product;

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    /// Always at least 1; a line reaching 0 is removed.
    pub quantity: u32,
}

impl LineItem {
    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The values the pricing workers compare to detect a cart change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartFingerprint {
    pub item_count: u32,
    pub subtotal: Money,
}

/// Immutable copy of the cart taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub revision: u64,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn fingerprint(&self) -> CartFingerprint {
        CartFingerprint {
            item_count: self.item_count(),
            subtotal: self.subtotal,
        }
    }

    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

impl std::fmt::Display for CartSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== CART ===")?;
        for item in &self.items {
            writeln!(
                f,
                "{} x{} = {}",
                item.product_name,
                item.quantity,
                item.line_total()
            )?;
        }
        writeln!(f, "Subtotal: {}", self.subtotal)?;
        if self.discount.is_positive() {
            writeln!(f, "Discount: -{}", self.discount)?;
        }
        write!(f, "TOTAL: {}", self.total)
    }
}

#[derive(Debug, Default)]
struct CartState {
    items: Vec<LineItem>,
    subtotal: Money,
    discount: Money,
    total: Money,
    revision: u64,
}

impl CartState {
    fn recompute(&mut self) {
        self.subtotal = self.items.iter().map(LineItem::line_total).sum();
        // A discount never exceeds what it discounts; the engine corrects
        // the amount on its next pass.
        self.discount = self.discount.min(self.subtotal);
        self.total = self.subtotal - self.discount;
    }

    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            subtotal: self.subtotal,
            discount: self.discount,
            total: self.total,
            revision: self.revision,
        }
    }
}

/// Mutable line-item collection with computed totals.
///
/// Invariants, held after every operation:
/// - `total == subtotal - discount`
/// - `subtotal` is the sum of `unit_price * quantity` over current lines
/// - every present line has `quantity >= 1`
#[derive(Clone)]
pub struct SharedCart {
    state: Arc<Mutex<CartState>>,
    revisions: Arc<watch::Sender<u64>>,
}

impl SharedCart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(CartState::default())),
            revisions: Arc::new(revisions),
        }
    }

    /// Subscribes to mutation revisions.
    ///
    /// The revision is published while the mutation still holds the cart lock,
    /// so a receiver that reads the cart after `changed()` sees that mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    fn commit(&self, state: &mut CartState) {
        state.revision += 1;
        self.revisions.send_replace(state.revision);
    }

    /// Adds one unit of a product, creating the line if needed.
    pub async fn add_item(&self, product: &Product) {
        let mut state = self.state.lock().await;
        match state.items.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.quantity += 1,
            None => state.items.push(LineItem {
                product_id: product.id,
                product_name: product.name.clone(),
                unit_price: product.price,
                quantity: 1,
            }),
        }
        state.recompute();
        self.commit(&mut state);
        tracing::debug!(product_id = %product.id, subtotal = %state.subtotal, "item added to cart");
    }

    /// Removes one unit of a product; the line disappears at zero.
    ///
    /// Removing a product that is not in the cart is a no-op.
    pub async fn remove_item(&self, product_id: ProductId) {
        let mut state = self.state.lock().await;
        let Some(pos) = state
            .items
            .iter()
            .position(|item| item.product_id == product_id)
        else {
            return;
        };

        if state.items[pos].quantity <= 1 {
            state.items.remove(pos);
        } else {
            state.items[pos].quantity -= 1;
        }
        if state.items.is_empty() {
            state.discount = Money::ZERO;
        }
        state.recompute();
        self.commit(&mut state);
        tracing::debug!(%product_id, subtotal = %state.subtotal, "item removed from cart");
    }

    /// Recomputes subtotal and total from the current lines.
    ///
    /// Idempotent: without an intervening mutation the totals are unchanged.
    pub async fn recompute_totals(&self) -> CartSnapshot {
        let mut state = self.state.lock().await;
        state.recompute();
        state.snapshot()
    }

    /// Replaces the current discount (never compounds).
    ///
    /// The amount is clamped to `[0, subtotal]`.
    pub async fn apply_discount(&self, amount: Money) -> CartSnapshot {
        let mut state = self.state.lock().await;
        state.discount = amount.max(Money::ZERO).min(state.subtotal);
        state.total = state.subtotal - state.discount;
        self.commit(&mut state);
        state.snapshot()
    }

    /// Empties the cart and resets all totals.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.items.clear();
        state.subtotal = Money::ZERO;
        state.discount = Money::ZERO;
        state.total = Money::ZERO;
        self.commit(&mut state);
    }

    /// Returns a defensive copy of lines and totals.
    pub async fn snapshot(&self) -> CartSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn fingerprint(&self) -> CartFingerprint {
        let state = self.state.lock().await;
        CartFingerprint {
            item_count: state.items.iter().map(|item| item.quantity).sum(),
            subtotal: state.subtotal,
        }
    }

    pub async fn subtotal(&self) -> Money {
        self.state.lock().await.subtotal
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Current mutation revision, without taking the lock.
    pub fn revision(&self) -> u64 {
        *self.revisions.borrow()
    }
}

impl Default for SharedCart {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCart")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}
