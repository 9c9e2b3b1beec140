use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CardId, Money};
use domain::{Card, CardBrand, NewCard};
use rand::Rng;
use store::CardRepository;

use crate::{Identity, Result, SessionGate, Worker, WorkerError};

/// Decides whether the simulated gateway approves a charge.
pub trait ApprovalSource: Send + Sync {
    fn approve(&self, amount: Money) -> bool;
}

/// Approves with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomApproval {
    rate: f64,
}

impl RandomApproval {
    /// `rate` is clamped to `[0.0, 1.0]`.
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }
}

impl ApprovalSource for RandomApproval {
    fn approve(&self, _amount: Money) -> bool {
        rand::thread_rng().gen_bool(self.rate)
    }
}

/// Always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedApproval(pub bool);

impl ApprovalSource for FixedApproval {
    fn approve(&self, _amount: Money) -> bool {
        self.0
    }
}

/// Proof of an approved charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub card_id: CardId,
    pub amount: Money,
    pub authorization: String,
}

/// Card registration, listing and simulated charges for the signed-in user.
pub struct CardService {
    cards: Arc<dyn CardRepository>,
    gate: SessionGate,
    approval: Arc<dyn ApprovalSource>,
    charge_delay: Duration,
}

impl CardService {
    pub fn new(
        cards: Arc<dyn CardRepository>,
        gate: SessionGate,
        approval: Arc<dyn ApprovalSource>,
        charge_delay: Duration,
    ) -> Self {
        Self {
            cards,
            gate,
            approval,
            charge_delay,
        }
    }

    fn identity(&self) -> Result<Identity> {
        self.gate.identity().ok_or(WorkerError::NotAuthenticated)
    }

    /// Validates and stores a card for the current user.
    #[tracing::instrument(skip(self, number))]
    pub async fn register_card(
        &self,
        number: &str,
        holder: &str,
        expiry: &str,
        brand: CardBrand,
    ) -> Result<Card> {
        let identity = self.identity()?;
        let card = NewCard::new(identity.user_id, number, holder, expiry, brand)?;
        let card = self.cards.save(card).await?;
        tracing::info!(card_id = %card.id, last4 = %card.last4, "card registered");
        Ok(card)
    }

    /// Active cards of the current user.
    pub async fn list_cards(&self) -> Result<Vec<Card>> {
        let identity = self.identity()?;
        let cards = self.cards.list_by_user(identity.user_id).await?;
        Ok(cards.into_iter().filter(|card| card.active).collect())
    }

    /// Looks up a card of the current user, active or not.
    async fn owned_card(&self, card_id: CardId) -> Result<Card> {
        let identity = self.identity()?;
        match self.cards.find_by_id(card_id).await? {
            Some(card) if card.user_id == identity.user_id => Ok(card),
            _ => Err(WorkerError::CardNotFound(card_id)),
        }
    }

    /// Deactivates a card of the current user.
    pub async fn deactivate(&self, card_id: CardId) -> Result<()> {
        self.owned_card(card_id).await?;
        if !self.cards.deactivate(card_id).await? {
            return Err(WorkerError::CardNotFound(card_id));
        }
        tracing::info!(%card_id, "card deactivated");
        Ok(())
    }

    /// Charges `amount` to a card.
    ///
    /// An unknown or inactive card is rejected before the gateway is
    /// contacted ([`WorkerError::CardNotFound`], [`WorkerError::CardInactive`]);
    /// a gateway refusal is [`WorkerError::PaymentDeclined`].
    #[tracing::instrument(skip(self))]
    pub async fn charge(&self, card_id: CardId, amount: Money) -> Result<ChargeReceipt> {
        let card = match self.owned_card(card_id).await {
            Ok(card) => card,
            Err(e) => {
                metrics::counter!("card_charges_total", "outcome" => "rejected").increment(1);
                return Err(e);
            }
        };
        if !card.active {
            metrics::counter!("card_charges_total", "outcome" => "rejected").increment(1);
            return Err(WorkerError::CardInactive(card_id));
        }

        tokio::time::sleep(self.charge_delay).await;

        if !self.approval.approve(amount) {
            metrics::counter!("card_charges_total", "outcome" => "declined").increment(1);
            tracing::warn!(%card_id, %amount, "charge declined");
            return Err(WorkerError::PaymentDeclined { amount });
        }

        let authorization = format!("AUTH-{:06}", rand::thread_rng().gen_range(0..1_000_000));
        metrics::counter!("card_charges_total", "outcome" => "approved").increment(1);
        tracing::info!(%card_id, %amount, %authorization, "charge approved");
        Ok(ChargeReceipt {
            card_id,
            amount,
            authorization,
        })
    }
}

#[async_trait]
impl Worker for CardService {
    fn name(&self) -> &'static str {
        "card-service"
    }

    async fn run_active(&self, identity: &Identity) -> Result<()> {
        match self.cards.list_by_user(identity.user_id).await {
            Ok(cards) => {
                let active = cards.iter().filter(|card| card.active).count();
                tracing::info!(active_cards = active, "card service ready");
            }
            Err(e) => tracing::warn!(error = %e, "could not load cards"),
        }
        std::future::pending().await
    }
}
