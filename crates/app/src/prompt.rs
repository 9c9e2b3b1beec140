//! Checkout decisions answered on the console.

use std::sync::Arc;

use async_trait::async_trait;
use checkout::{
    CheckoutContext, CheckoutError, CheckoutPrompt, Decision, PaymentChoice, PostPurchaseChoice,
};
use common::Money;
use domain::{Card, CartSnapshot, ShippingChoice, ShippingMode, ShippingPolicy};
use workers::SessionSupervisor;

use crate::console::Terminal;

fn is_cancel(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "c" | "cancel")
}

fn is_yes(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "si")
}

/// Asks the customer through a [`Terminal`]. Every answer counts as session
/// activity. Closed input cancels the pending choice.
pub struct ConsolePrompt {
    terminal: Arc<dyn Terminal>,
    supervisor: Arc<SessionSupervisor>,
    shipping: ShippingPolicy,
}

impl ConsolePrompt {
    pub fn new(
        terminal: Arc<dyn Terminal>,
        supervisor: Arc<SessionSupervisor>,
        shipping: ShippingPolicy,
    ) -> Self {
        Self {
            terminal,
            supervisor,
            shipping,
        }
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        let line = self.terminal.read_line(prompt).await;
        self.supervisor.touch();
        line.map(|line| line.trim().to_string())
    }

    fn shipping_menu(&self, subtotal: Money) -> String {
        let home = self.shipping.cost(subtotal, ShippingMode::Home);
        let home = if home.is_zero() {
            "free".to_string()
        } else {
            format!("{home}, free from {}", self.shipping.free_threshold)
        };
        format!(
            "Shipping:\n  1) Store pickup (free)\n  2) Home delivery ({home})\n  c) Cancel"
        )
    }
}

#[async_trait]
impl CheckoutPrompt for ConsolePrompt {
    async fn confirm(&self, cart: &CartSnapshot) -> bool {
        self.terminal.print(&cart.to_string());
        self.ask("Proceed to checkout? [y/N]: ")
            .await
            .is_some_and(|answer| is_yes(&answer))
    }

    async fn choose_shipping(&self, cart: &CartSnapshot) -> Decision<ShippingChoice> {
        loop {
            self.terminal.print(&self.shipping_menu(cart.subtotal));
            let Some(answer) = self.ask("Shipping option: ").await else {
                return Decision::Cancel;
            };
            match answer.as_str() {
                "1" => return Decision::Proceed(ShippingChoice::pickup()),
                "2" => {
                    let Some(address) = self.ask("Delivery address: ").await else {
                        return Decision::Cancel;
                    };
                    if is_cancel(&address) {
                        return Decision::Cancel;
                    }
                    return Decision::Proceed(ShippingChoice::home(address));
                }
                other if is_cancel(other) => return Decision::Cancel,
                _ => self.terminal.print("Choose 1, 2 or c."),
            }
        }
    }

    async fn choose_payment(&self, cards: &[Card], grand_total: Money) -> Decision<PaymentChoice> {
        let cash = cards.len() + 1;
        let mut menu = format!("Amount due: {grand_total}\nPayment:");
        for (index, card) in cards.iter().enumerate() {
            menu.push_str(&format!("\n  {}) {card}", index + 1));
        }
        menu.push_str(&format!("\n  {cash}) Cash\n  c) Cancel"));

        loop {
            self.terminal.print(&menu);
            let Some(answer) = self.ask("Payment option: ").await else {
                return Decision::Cancel;
            };
            if is_cancel(&answer) {
                return Decision::Cancel;
            }
            if answer.eq_ignore_ascii_case("cash") {
                return Decision::Proceed(PaymentChoice::Cash);
            }
            match answer.parse::<usize>() {
                Ok(n) if n == cash => return Decision::Proceed(PaymentChoice::Cash),
                Ok(n) if (1..cash).contains(&n) => {
                    return Decision::Proceed(PaymentChoice::Card(cards[n - 1].id));
                }
                _ => self.terminal.print("Unknown payment option."),
            }
        }
    }

    async fn choose_after_purchase(&self) -> PostPurchaseChoice {
        self.terminal
            .print("What next?\n  1) New purchase\n  2) View receipt\n  3) Exit");
        match self.ask("Option: ").await {
            Some(answer) => PostPurchaseChoice::from_input(&answer),
            None => PostPurchaseChoice::Terminate,
        }
    }

    fn show_error(&self, error: &CheckoutError) {
        self.terminal.print(&format!("Error: {error}"));
    }

    fn purchase_completed(&self, context: &CheckoutContext, warning: Option<&str>) {
        let folio = context.folio().map(|f| f.to_string()).unwrap_or_default();
        self.terminal.print(&format!(
            "Purchase completed. Folio {folio}, charged {}.",
            context.grand_total()
        ));
        if let Some(warning) = warning {
            self.terminal.print(&format!("Warning: {warning}"));
        }
    }

    fn show_receipt(&self, receipt: &str) {
        self.terminal.print(receipt);
    }
}
