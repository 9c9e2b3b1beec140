//! Capability interfaces the orchestrator drives.
//!
//! Each step of the pipeline talks to one narrow trait so tests can swap
//! any collaborator. Adapters for the real workers live in
//! [`adapters`](crate::adapters).

use async_trait::async_trait;
use common::{CardId, Money};
use domain::{
    Card, CartSnapshot, DomainError, Folio, LineItem, NewOrder, Order, PaymentMethod,
    PaymentRecord, ShippingChoice,
};
use serde::{Deserialize, Serialize};
use workers::ChargeReceipt;

use crate::context::CheckoutContext;
use crate::error::{CheckoutError, Result};

/// A foreground answer: a value, or the customer backed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    Proceed(T),
    Cancel,
}

impl<T> Decision<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Decision::Proceed(value) => Some(value),
            Decision::Cancel => None,
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "card_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentChoice {
    Card(CardId),
    Cash,
}

impl PaymentChoice {
    pub fn card_id(&self) -> Option<CardId> {
        match self {
            PaymentChoice::Card(id) => Some(*id),
            PaymentChoice::Cash => None,
        }
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentChoice::Card(_) => PaymentMethod::Card,
            PaymentChoice::Cash => PaymentMethod::Cash,
        }
    }
}

/// What to do once a purchase is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostPurchaseChoice {
    #[default]
    NewPurchase,
    ViewReceipt,
    Terminate,
}

impl PostPurchaseChoice {
    /// Reads a console answer. Anything unrecognized starts a new purchase.
    pub fn from_input(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "2" | "r" | "receipt" | "view" => PostPurchaseChoice::ViewReceipt,
            "3" | "t" | "exit" | "quit" | "terminate" => PostPurchaseChoice::Terminate,
            _ => PostPurchaseChoice::NewPurchase,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostPurchaseChoice::NewPurchase => "NEW_PURCHASE",
            PostPurchaseChoice::ViewReceipt => "VIEW_RECEIPT",
            PostPurchaseChoice::Terminate => "TERMINATE",
        }
    }
}

/// A validated shipping choice and its cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub choice: ShippingChoice,
    pub cost: Money,
}

/// Validates shipping choices and prices them.
pub trait ShippingPricer: Send + Sync {
    fn quote(
        &self,
        choice: ShippingChoice,
        subtotal: Money,
    ) -> std::result::Result<ShippingQuote, DomainError>;
}

/// The cart as checkout sees it.
#[async_trait]
pub trait CartAccess: Send + Sync {
    /// Current totals with any pending discount applied.
    async fn settle(&self) -> CartSnapshot;

    /// Empties the cart after a completed purchase.
    async fn clear(&self);
}

/// Card listing and charging.
#[async_trait]
pub trait CardCharger: Send + Sync {
    /// Cards the customer may pay with.
    async fn available_cards(&self) -> Result<Vec<Card>>;

    /// Charges `amount`. A refusal is [`CheckoutError::PaymentDeclined`];
    /// an unusable card is [`CheckoutError::CardRejected`].
    async fn charge(&self, card_id: CardId, amount: Money) -> Result<ChargeReceipt>;
}

/// Order persistence.
#[async_trait]
pub trait OrderPersister: Send + Sync {
    fn next_folio(&self) -> Folio;

    async fn save_order(&self, order: NewOrder) -> Result<Order>;

    async fn save_payment(&self, payment: PaymentRecord) -> Result<()>;
}

/// Turns a finished checkout into receipt text.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, context: &CheckoutContext, lines: &[LineItem]) -> String;
}

/// Ends the user's session.
pub trait SessionControl: Send + Sync {
    /// Returns false if the session had already ended.
    fn end_session(&self) -> bool;
}

/// The foreground: every decision the customer makes during checkout.
///
/// Each call blocks until the customer answers. The orchestrator abandons
/// a pending call when the session ends.
#[async_trait]
pub trait CheckoutPrompt: Send + Sync {
    /// Asks the customer to confirm paying for `cart`.
    async fn confirm(&self, cart: &CartSnapshot) -> bool;

    async fn choose_shipping(&self, cart: &CartSnapshot) -> Decision<ShippingChoice>;

    async fn choose_payment(&self, cards: &[Card], grand_total: Money) -> Decision<PaymentChoice>;

    async fn choose_after_purchase(&self) -> PostPurchaseChoice;

    /// Reports a rejected answer before the question is asked again.
    fn show_error(&self, error: &CheckoutError);

    /// Confirms a completed purchase. `warning` is set when the order record
    /// could not be fully stored.
    fn purchase_completed(&self, context: &CheckoutContext, warning: Option<&str>);

    fn show_receipt(&self, receipt: &str);
}
