//! End-to-end console sessions against the in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app::catalog::seed_products;
use app::{Shell, ShellExit, Terminal};
use async_trait::async_trait;
use checkout::{CheckoutConfig, CheckoutOrchestrator, CheckoutPorts};
use common::Money;
use domain::{PaymentMethod, SharedCart, ShippingPolicy};
use store::{InMemoryStore, OrderRepository, Repositories, UserDirectory};
use workers::{FixedApproval, Services, SessionGate, WorkerConfig, WorkerSet, WorkerState};

/// Replays input lines and records everything printed. Running out of
/// lines behaves like a closed stdin.
struct ScriptedTerminal {
    input: Mutex<VecDeque<String>>,
    output: Mutex<Vec<String>>,
}

impl ScriptedTerminal {
    fn new(lines: &[&str]) -> Self {
        Self {
            input: Mutex::new(lines.iter().map(|line| line.to_string()).collect()),
            output: Mutex::new(Vec::new()),
        }
    }

    fn output(&self) -> String {
        self.output.lock().unwrap().join("\n")
    }
}

#[async_trait]
impl Terminal for ScriptedTerminal {
    async fn read_line(&self, _prompt: &str) -> Option<String> {
        self.input.lock().unwrap().pop_front()
    }

    fn print(&self, text: &str) {
        self.output.lock().unwrap().push(text.to_string());
    }
}

struct TestHarness {
    store: InMemoryStore,
    repos: Repositories,
    services: Services,
    orchestrator: Arc<CheckoutOrchestrator>,
    workers: WorkerSet,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::with_products(seed_products()).await;
        let repos = Repositories::from_store(Arc::new(store.clone()));
        let services = Services::new(
            SharedCart::new(),
            &repos,
            SessionGate::new(),
            &WorkerConfig::immediate(),
            Arc::new(app::log_totals),
            Arc::new(FixedApproval(true)),
        );
        services.authenticator.register("ana", "secret").await.unwrap();
        let workers = services.spawn_workers();
        let orchestrator = Arc::new(CheckoutOrchestrator::new(
            CheckoutPorts::from_services(&services, &CheckoutConfig::default()),
            services.gate.clone(),
        ));
        Self {
            store,
            repos,
            services,
            orchestrator,
            workers,
        }
    }

    async fn run(&self, lines: &[&str]) -> (ShellExit, String) {
        let terminal = Arc::new(ScriptedTerminal::new(lines));
        let shell = Shell::new(
            terminal.clone(),
            self.services.clone(),
            self.repos.catalog.clone(),
            self.orchestrator.clone(),
            ShippingPolicy::default(),
        );
        let exit = tokio::time::timeout(Duration::from_secs(5), shell.run())
            .await
            .expect("shell did not finish");
        (exit, terminal.output())
    }
}

#[tokio::test]
async fn test_cash_pickup_purchase_then_exit() {
    let h = TestHarness::new().await;

    // Vacuum cleaner, $1299.00: 15% tier.
    let (exit, output) = h
        .run(&["login ana", "secret", "add 17", "checkout", "y", "1", "1", "3"])
        .await;

    assert_eq!(exit, ShellExit::SessionEnded);
    assert!(output.contains("Welcome, ana."), "{output}");
    assert!(output.contains("Purchase completed."), "{output}");
    assert!(output.contains("Goodbye."), "{output}");

    let user_id = UserDirectory::find_id(&h.store, "ana").await.unwrap().unwrap();
    let orders = OrderRepository::find_by_user(&h.store, user_id).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].grand_total(), Money::from_cents(110_415));
    assert!(!h.services.gate.is_authenticated());
    assert!(h.services.supervisor.has_ended());
}

#[tokio::test]
async fn test_commands_need_login() {
    let h = TestHarness::new().await;

    let (exit, output) = h.run(&["cart", "list Hogar"]).await;

    assert_eq!(exit, ShellExit::InputClosed);
    assert!(output.contains("Please log in first."), "{output}");
    assert!(output.contains("Aspiradora Koblenz"), "{output}");
}

#[tokio::test]
async fn test_wrong_password_is_reported() {
    let h = TestHarness::new().await;

    let (exit, output) = h.run(&["login ana", "nope"]).await;

    assert_eq!(exit, ShellExit::InputClosed);
    assert!(output.contains("Invalid username or password"), "{output}");
    assert!(!h.services.gate.is_authenticated());
}

#[tokio::test]
async fn test_card_purchase_and_return() {
    let h = TestHarness::new().await;

    let (exit, output) = h
        .run(&[
            "login ana",
            "secret",
            "addcard",
            "4111 1111 1111 1111",
            "Ana Lopez",
            "01/30",
            "visa",
            "add 1 2",
            "checkout",
            "y",
            "1",
            "1",
            "1",
            "cart",
        ])
        .await;
    assert_eq!(exit, ShellExit::InputClosed);
    assert!(output.contains("Card registered"), "{output}");
    assert!(output.contains("Your cart is empty."), "{output}");

    let orders = h.services.history.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    let payment = h.services.history.payment_for(&orders[0]).await.unwrap().unwrap();
    assert_eq!(payment.method, PaymentMethod::Card);

    let folio = orders[0].folio.to_string();
    let (_, output) = h
        .run(&[&format!("return {folio}"), "2", "20", "broken seal", "returns"])
        .await;
    assert!(output.contains("Return registered"), "{output}");
    assert!(output.contains("PROCESSED"), "{output}");
}

#[tokio::test]
async fn test_cancelled_checkout_keeps_cart() {
    let h = TestHarness::new().await;

    let (_, output) = h
        .run(&["login ana", "secret", "add 5 3", "checkout", "y", "c", "cart"])
        .await;

    assert!(output.contains("Checkout cancelled. Your cart was kept."), "{output}");
    assert_eq!(h.services.cart.snapshot().await.item_count(), 3);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_logout_stops_workers() {
    let h = TestHarness::new().await;

    let (exit, _) = h.run(&["login ana", "secret", "logout"]).await;

    assert_eq!(exit, ShellExit::SessionEnded);
    tokio::time::timeout(
        Duration::from_secs(2),
        h.workers.wait_for_all(WorkerState::Stopped),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_promo_replaces_tier_discount() {
    let h = TestHarness::new().await;

    // Two Santa Clara six-packs: $460.00, below every tier.
    let (_, output) = h
        .run(&["login ana", "secret", "add 2 2", "promo 50 Half off", "cart"])
        .await;

    assert!(output.contains("Discount: -$230.00"), "{output}");
    assert_eq!(h.services.cart.snapshot().await.total, Money::from_units(230));
}
