//! The checkout pipeline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use common::{CheckoutId, Money, OrderId, UserId};
use domain::{CartSnapshot, DomainError, Folio, NewOrder, PaymentRecord};
use tokio::sync::watch;
use workers::SessionGate;

use crate::adapters::CheckoutPorts;
use crate::context::CheckoutContext;
use crate::error::{CheckoutError, Result};
use crate::events::{AbortReason, CheckoutEvent};
use crate::ports::{CheckoutPrompt, Decision, PaymentChoice, PostPurchaseChoice, ShippingQuote};
use crate::state::CheckoutState;

/// How an attempt ended.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Charged and reported to the customer. `warning` is set when the
    /// order record may be incomplete.
    Completed {
        choice: PostPurchaseChoice,
        warning: Option<String>,
    },
    /// Ended before charging. The cart is untouched.
    Aborted {
        at: CheckoutState,
        reason: AbortReason,
    },
    /// The charge failed. The cart is untouched.
    Failed { error: CheckoutError },
}

/// Result of one attempt.
#[derive(Debug)]
pub struct CheckoutReport {
    pub outcome: CheckoutOutcome,
    /// Last state the attempt reached before returning to idle.
    pub final_state: CheckoutState,
    pub events: Vec<CheckoutEvent>,
    pub context: CheckoutContext,
    pub receipt: Option<String>,
}

impl CheckoutReport {
    pub fn id(&self) -> CheckoutId {
        self.context.id()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, CheckoutOutcome::Completed { .. })
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.context.order_id()
    }

    pub fn folio(&self) -> Option<&Folio> {
        self.context.folio()
    }

    pub fn warning(&self) -> Option<&str> {
        match &self.outcome {
            CheckoutOutcome::Completed { warning, .. } => warning.as_deref(),
            _ => None,
        }
    }

    /// Event type names in recording order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.iter().map(CheckoutEvent::event_type).collect()
    }
}

struct Attempt {
    context: CheckoutContext,
    events: Vec<CheckoutEvent>,
    state: CheckoutState,
    receipt: Option<String>,
}

impl Attempt {
    fn new(user_id: UserId, cart: CartSnapshot) -> Self {
        let context = CheckoutContext::new(user_id, cart);
        let started = CheckoutEvent::Started {
            checkout_id: context.id(),
            user_id,
            items: context.cart().item_count(),
            total: context.cart().total,
            started_at: context.started_at(),
        };
        Self {
            context,
            events: vec![started],
            state: CheckoutState::Idle,
            receipt: None,
        }
    }

    fn record(&mut self, event: CheckoutEvent) {
        tracing::debug!(
            checkout_id = %self.context.id(),
            event = event.event_type(),
            state = %self.state,
            "checkout event"
        );
        self.events.push(event);
    }

    fn into_report(self, outcome: CheckoutOutcome) -> CheckoutReport {
        CheckoutReport {
            outcome,
            final_state: self.state,
            events: self.events,
            context: self.context,
            receipt: self.receipt,
        }
    }
}

/// Clears the in-flight flag and publishes `Idle` however the run ends.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<CheckoutState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_replace(CheckoutState::Idle);
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives one checkout attempt at a time through shipping, payment,
/// persistence, receipt and cart reset.
///
/// Every wait on the customer is abandoned as soon as the session ends.
pub struct CheckoutOrchestrator {
    ports: CheckoutPorts,
    gate: SessionGate,
    state: watch::Sender<CheckoutState>,
    in_flight: AtomicBool,
}

impl CheckoutOrchestrator {
    pub fn new(ports: CheckoutPorts, gate: SessionGate) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            ports,
            gate,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// State of the attempt in progress, `Idle` when there is none.
    pub fn state(&self) -> CheckoutState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one checkout attempt with `prompt` as the foreground.
    ///
    /// Errors are returned only when no attempt could start: another one is
    /// in flight, nobody is signed in, the application is shutting down, or
    /// the cart is empty. Everything that happens once the attempt has
    /// started is described by the report's outcome.
    #[tracing::instrument(skip(self, prompt))]
    pub async fn run(&self, prompt: &dyn CheckoutPrompt) -> Result<CheckoutReport> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(CheckoutError::InvalidState {
                expected: CheckoutState::Idle.to_string(),
                actual: self.state(),
            });
        }
        let _guard = InFlight {
            flag: &self.in_flight,
            state: &self.state,
        };

        if !self.gate.is_active() {
            return Err(CheckoutError::Cancelled);
        }
        let identity = self.gate.identity().ok_or(CheckoutError::NotAuthenticated)?;
        let cart = self.ports.cart.settle().await;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart.into());
        }

        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();
        let mut attempt = Attempt::new(identity.user_id, cart);
        tracing::info!(
            checkout_id = %attempt.context.id(),
            user = %identity,
            items = attempt.context.cart().item_count(),
            total = %attempt.context.cart().total,
            "checkout started"
        );

        let outcome = self.drive(prompt, &mut attempt).await?;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &outcome {
            CheckoutOutcome::Completed { choice, warning } => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    checkout_id = %attempt.context.id(),
                    folio = ?attempt.context.folio().map(Folio::as_str),
                    total = %attempt.context.grand_total(),
                    choice = choice.as_str(),
                    degraded = warning.is_some(),
                    "checkout completed"
                );
            }
            CheckoutOutcome::Aborted { at, reason } => {
                metrics::counter!("checkout_aborted_total").increment(1);
                tracing::info!(
                    checkout_id = %attempt.context.id(),
                    state = %at,
                    reason = reason.as_str(),
                    "checkout aborted"
                );
            }
            CheckoutOutcome::Failed { error } => {
                metrics::counter!("checkout_failed_total").increment(1);
                tracing::warn!(
                    checkout_id = %attempt.context.id(),
                    error = %error,
                    "checkout failed"
                );
            }
        }

        Ok(attempt.into_report(outcome))
    }

    async fn drive(
        &self,
        prompt: &dyn CheckoutPrompt,
        attempt: &mut Attempt,
    ) -> Result<CheckoutOutcome> {
        let cart = attempt.context.cart().clone();
        match self.until_session_end(prompt.confirm(&cart)).await {
            None => return self.abort(attempt, AbortReason::SessionEnded),
            Some(false) => return self.abort(attempt, AbortReason::NotConfirmed),
            Some(true) => {}
        }

        self.transition(attempt, CheckoutState::AwaitShipping)?;
        let quote = match self.await_shipping(prompt, attempt, &cart).await {
            Ok(quote) => quote,
            Err(reason) => return self.abort(attempt, reason),
        };

        self.transition(attempt, CheckoutState::AwaitCard)?;
        let payment = match self.await_payment(prompt, attempt).await {
            Ok(payment) => payment,
            Err(reason) => return self.abort(attempt, reason),
        };

        self.transition(attempt, CheckoutState::Charging)?;
        let amount = attempt.context.grand_total();
        if let Err(error) = self.charge(attempt, payment, amount).await {
            self.transition(attempt, CheckoutState::Failed)?;
            return Ok(CheckoutOutcome::Failed { error });
        }

        self.transition(attempt, CheckoutState::Persisting)?;
        let warning = self.persist(attempt, &quote, payment, amount).await;

        self.transition(attempt, CheckoutState::Notifying)?;
        let receipt = self
            .ports
            .receipts
            .render(&attempt.context, &attempt.context.cart().items);
        if let Some(folio) = attempt.context.folio() {
            let folio = folio.to_string();
            attempt.record(CheckoutEvent::ReceiptRendered { folio });
        }
        attempt.receipt = Some(receipt.clone());
        prompt.purchase_completed(&attempt.context, warning.as_deref());
        prompt.show_receipt(&receipt);

        self.transition(attempt, CheckoutState::Resetting)?;
        self.ports.cart.clear().await;
        attempt.record(CheckoutEvent::CartReset);

        self.transition(attempt, CheckoutState::AwaitPostPurchaseChoice)?;
        loop {
            let Some(choice) = self.until_session_end(prompt.choose_after_purchase()).await else {
                attempt.record(CheckoutEvent::Aborted {
                    state: attempt.state,
                    reason: AbortReason::SessionEnded,
                });
                self.transition(attempt, CheckoutState::Aborted)?;
                return Ok(CheckoutOutcome::Completed {
                    choice: PostPurchaseChoice::Terminate,
                    warning,
                });
            };
            attempt.record(CheckoutEvent::PostPurchaseChoice { choice });

            match choice {
                PostPurchaseChoice::ViewReceipt => prompt.show_receipt(&receipt),
                PostPurchaseChoice::Terminate => {
                    self.ports.session.end_session();
                    self.transition(attempt, CheckoutState::Idle)?;
                    return Ok(CheckoutOutcome::Completed { choice, warning });
                }
                PostPurchaseChoice::NewPurchase => {
                    self.transition(attempt, CheckoutState::Idle)?;
                    return Ok(CheckoutOutcome::Completed { choice, warning });
                }
            }
        }
    }

    async fn await_shipping(
        &self,
        prompt: &dyn CheckoutPrompt,
        attempt: &mut Attempt,
        cart: &CartSnapshot,
    ) -> std::result::Result<ShippingQuote, AbortReason> {
        loop {
            let choice = match self.until_session_end(prompt.choose_shipping(cart)).await {
                None => return Err(AbortReason::SessionEnded),
                Some(Decision::Cancel) => return Err(AbortReason::Cancelled),
                Some(Decision::Proceed(choice)) => choice,
            };
            match self.ports.shipping.quote(choice, cart.subtotal) {
                Ok(quote) => {
                    attempt.record(CheckoutEvent::ShippingChosen {
                        mode: quote.choice.mode,
                        cost: quote.cost,
                    });
                    attempt.context.set_shipping(quote.clone());
                    return Ok(quote);
                }
                Err(e) => self.reject_input(prompt, attempt, e.into()),
            }
        }
    }

    async fn await_payment(
        &self,
        prompt: &dyn CheckoutPrompt,
        attempt: &mut Attempt,
    ) -> std::result::Result<PaymentChoice, AbortReason> {
        // Cash stays available when the card list cannot be loaded.
        let cards = match self.ports.cards.available_cards().await {
            Ok(cards) => cards,
            Err(e) => {
                tracing::warn!(error = %e, "could not load cards");
                Vec::new()
            }
        };
        let grand_total = attempt.context.grand_total();

        match self
            .until_session_end(prompt.choose_payment(&cards, grand_total))
            .await
        {
            None => Err(AbortReason::SessionEnded),
            Some(Decision::Cancel) => Err(AbortReason::Cancelled),
            Some(Decision::Proceed(payment)) => {
                attempt.record(CheckoutEvent::PaymentMethodChosen {
                    method: payment.method(),
                    card_id: payment.card_id(),
                });
                attempt.context.set_payment(payment);
                Ok(payment)
            }
        }
    }

    async fn charge(
        &self,
        attempt: &mut Attempt,
        payment: PaymentChoice,
        amount: Money,
    ) -> Result<()> {
        let card_id = match payment {
            PaymentChoice::Cash => {
                attempt.record(CheckoutEvent::Charged {
                    amount,
                    authorization: None,
                });
                return Ok(());
            }
            PaymentChoice::Card(card_id) => card_id,
        };

        match self.ports.cards.charge(card_id, amount).await {
            Ok(receipt) => {
                attempt.record(CheckoutEvent::Charged {
                    amount,
                    authorization: Some(receipt.authorization.clone()),
                });
                attempt.context.set_authorization(receipt.authorization);
                Ok(())
            }
            Err(error) => {
                attempt.record(CheckoutEvent::ChargeFailed {
                    amount,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Stores the order and its payment record. Returns a warning instead of
    /// failing: the customer has already been charged.
    async fn persist(
        &self,
        attempt: &mut Attempt,
        quote: &ShippingQuote,
        payment: PaymentChoice,
        amount: Money,
    ) -> Option<String> {
        let folio = self.ports.orders.next_folio();
        attempt.context.set_folio(folio.clone());

        let order = NewOrder::from_snapshot(
            attempt.context.user_id(),
            folio.clone(),
            attempt.context.cart(),
            &quote.choice,
            quote.cost,
        );
        let saved = match order {
            Ok(order) => self.ports.orders.save_order(order).await,
            Err(e) => Err(e.into()),
        };
        let order = match saved {
            Ok(order) => order,
            Err(e) => return Some(self.persistence_failed(attempt, &folio, e)),
        };

        attempt.context.set_order_id(order.id);
        attempt.record(CheckoutEvent::Persisted {
            folio: folio.to_string(),
            order_id: order.id,
        });

        let record = PaymentRecord::new(order.id, payment.card_id(), amount);
        match self.ports.orders.save_payment(record).await {
            Ok(()) => None,
            Err(e) => Some(self.persistence_failed(attempt, &folio, e)),
        }
    }

    fn persistence_failed(
        &self,
        attempt: &mut Attempt,
        folio: &Folio,
        error: CheckoutError,
    ) -> String {
        tracing::warn!(%folio, error = %error, "order record may be incomplete");
        attempt.record(CheckoutEvent::PersistenceFailed {
            folio: folio.to_string(),
            error: error.to_string(),
        });
        format!("Purchase {folio} completed, but its record may be incomplete: {error}")
    }

    fn reject_input(
        &self,
        prompt: &dyn CheckoutPrompt,
        attempt: &mut Attempt,
        error: CheckoutError,
    ) {
        tracing::debug!(state = %attempt.state, error = %error, "input rejected");
        attempt.record(CheckoutEvent::InputRejected {
            state: attempt.state,
            error: error.to_string(),
        });
        prompt.show_error(&error);
    }

    fn abort(&self, attempt: &mut Attempt, reason: AbortReason) -> Result<CheckoutOutcome> {
        let at = attempt.state;
        attempt.record(CheckoutEvent::Aborted { state: at, reason });
        if at.is_awaiting() {
            self.transition(attempt, CheckoutState::Aborted)?;
        }
        Ok(CheckoutOutcome::Aborted { at, reason })
    }

    fn transition(&self, attempt: &mut Attempt, next: CheckoutState) -> Result<()> {
        if !attempt.state.can_transition_to(next) {
            return Err(CheckoutError::InvalidState {
                expected: format!("a state leading to {next}"),
                actual: attempt.state,
            });
        }
        tracing::debug!(from = %attempt.state, to = %next, "checkout transition");
        attempt.state = next;
        self.state.send_replace(next);
        Ok(())
    }

    /// Waits for a foreground decision, giving up when the session ends.
    async fn until_session_end<T>(&self, decision: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.gate.wait_session_end() => None,
            value = decision => Some(value),
        }
    }
}
