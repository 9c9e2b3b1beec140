use std::sync::Arc;

use domain::SharedCart;
use store::Repositories;

use crate::{
    ApprovalSource, Authenticator, CardService, DiscountEngine, PriceRecalculator,
    PurchaseHistory, ReturnsService, SessionGate, SessionSupervisor, TotalsListener,
    WorkerConfig, WorkerSet,
};

/// Every worker of one application run, wired to one cart and one gate.
#[derive(Clone)]
pub struct Services {
    pub gate: SessionGate,
    pub cart: SharedCart,
    pub authenticator: Arc<Authenticator>,
    pub recalculator: Arc<PriceRecalculator>,
    pub discounts: Arc<DiscountEngine>,
    pub cards: Arc<CardService>,
    pub history: Arc<PurchaseHistory>,
    pub returns: Arc<ReturnsService>,
    pub supervisor: Arc<SessionSupervisor>,
}

impl Services {
    pub fn new(
        cart: SharedCart,
        repos: &Repositories,
        gate: SessionGate,
        config: &WorkerConfig,
        listener: Arc<dyn TotalsListener>,
        approval: Arc<dyn ApprovalSource>,
    ) -> Self {
        let recalculator = Arc::new(PriceRecalculator::new(cart.clone(), listener));
        Self {
            authenticator: Arc::new(Authenticator::new(repos.users.clone(), gate.clone())),
            discounts: Arc::new(DiscountEngine::new(cart.clone(), recalculator.clone())),
            recalculator,
            cards: Arc::new(CardService::new(
                repos.cards.clone(),
                gate.clone(),
                approval,
                config.charge_delay,
            )),
            history: Arc::new(PurchaseHistory::new(repos.orders.clone(), gate.clone())),
            returns: Arc::new(ReturnsService::new(
                repos.returns.clone(),
                repos.orders.clone(),
                gate.clone(),
                config.return_processing_delay,
            )),
            supervisor: Arc::new(SessionSupervisor::new(
                gate.clone(),
                config.session_heartbeat,
                config.session_idle_timeout,
            )),
            gate,
            cart,
        }
    }

    /// Spawns every gated worker. They wait for a login before doing anything.
    pub fn spawn_workers(&self) -> WorkerSet {
        let mut set = WorkerSet::new(self.gate.clone());
        set.spawn(self.recalculator.clone());
        set.spawn(self.discounts.clone());
        set.spawn(self.cards.clone());
        set.spawn(self.history.clone());
        set.spawn(self.returns.clone());
        set.spawn(self.supervisor.clone());
        set
    }
}
