//! The interactive command loop.

use std::str::FromStr;
use std::sync::Arc;

use checkout::{CheckoutOrchestrator, CheckoutOutcome, PostPurchaseChoice};
use common::{CardId, Money, ProductId};
use domain::{CardBrand, DiscountRate, Folio, Order, ReturnReason, ShippingPolicy};
use store::ProductCatalog;
use workers::Services;

use crate::console::Terminal;
use crate::prompt::ConsolePrompt;

const HELP: &str = "\
Commands:
  login [user]            sign in
  register                create an account
  categories              list product categories
  list [category]         list products
  add <id> [qty]          add a product to the cart
  remove <id> [qty]       remove units of a product
  cart                    show the cart
  promo <percent> [label] apply a promotional discount
  nopromo                 drop the promotion
  checkout                pay for the cart
  history                 list your orders
  order <folio>           show one order
  returns                 list your returns
  return <folio>          request a return
  cards                   list your cards
  addcard                 register a card
  deactivate <card id>    deactivate a card
  logout                  end the session and exit
  quit                    exit
  help                    show this list";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Login(Option<String>),
    Register,
    Categories,
    List(Option<String>),
    Add { product_id: ProductId, quantity: u32 },
    Remove { product_id: ProductId, quantity: u32 },
    Cart,
    Promo { percent: u32, label: String },
    NoPromo,
    Checkout,
    History,
    Order(Folio),
    Returns,
    Return(Folio),
    Cards,
    AddCard,
    Deactivate(CardId),
    Logout,
    Quit,
}

impl Command {
    /// Whether the command needs a signed-in user.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Empty
                | Command::Help
                | Command::Login(_)
                | Command::Register
                | Command::Categories
                | Command::List(_)
                | Command::Quit
        )
    }
}

fn product_args(args: &[&str], usage: &str) -> Result<(ProductId, u32), String> {
    let id = args
        .first()
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| format!("usage: {usage}"))?;
    let quantity = match args.get(1) {
        Some(qty) => qty
            .parse::<u32>()
            .ok()
            .filter(|qty| *qty > 0)
            .ok_or_else(|| "Quantity must be a positive number.".to_string())?,
        None => 1,
    };
    Ok((ProductId::new(id), quantity))
}

fn folio_arg(args: &[&str], usage: &str) -> Result<Folio, String> {
    args.first()
        .map(|folio| Folio::new(*folio))
        .ok_or_else(|| format!("usage: {usage}"))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(Command::Empty);
        };
        let args: Vec<&str> = parts.collect();

        match name.to_ascii_lowercase().as_str() {
            "help" | "?" => Ok(Command::Help),
            "login" => Ok(Command::Login(args.first().map(|user| user.to_string()))),
            "register" => Ok(Command::Register),
            "categories" => Ok(Command::Categories),
            "list" | "products" => Ok(Command::List((!args.is_empty()).then(|| args.join(" ")))),
            "add" => {
                let (product_id, quantity) = product_args(&args, "add <id> [qty]")?;
                Ok(Command::Add {
                    product_id,
                    quantity,
                })
            }
            "remove" => {
                let (product_id, quantity) = product_args(&args, "remove <id> [qty]")?;
                Ok(Command::Remove {
                    product_id,
                    quantity,
                })
            }
            "cart" => Ok(Command::Cart),
            "promo" => {
                let percent = args
                    .first()
                    .and_then(|p| p.trim_end_matches('%').parse::<u32>().ok())
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| "usage: promo <percent 0-100> [label]".to_string())?;
                let label = if args.len() > 1 {
                    args[1..].join(" ")
                } else {
                    format!("{percent}% promotion")
                };
                Ok(Command::Promo { percent, label })
            }
            "nopromo" => Ok(Command::NoPromo),
            "checkout" | "pay" => Ok(Command::Checkout),
            "history" | "orders" => Ok(Command::History),
            "order" => Ok(Command::Order(folio_arg(&args, "order <folio>")?)),
            "returns" => Ok(Command::Returns),
            "return" => Ok(Command::Return(folio_arg(&args, "return <folio>")?)),
            "cards" => Ok(Command::Cards),
            "addcard" => Ok(Command::AddCard),
            "deactivate" => args
                .first()
                .and_then(|id| id.parse::<i64>().ok())
                .map(|id| Command::Deactivate(CardId::new(id)))
                .ok_or_else(|| "usage: deactivate <card id>".to_string()),
            "logout" => Ok(Command::Logout),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command '{other}'. Type 'help' for the list.")),
        }
    }
}

/// Why the shell stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The user asked to quit.
    Quit,
    /// The session ended: logout, idle timeout or the post-purchase exit.
    SessionEnded,
    /// Standard input was closed.
    InputClosed,
    /// The application is shutting down.
    Shutdown,
}

/// Reads commands and dispatches them to the services.
pub struct Shell {
    terminal: Arc<dyn Terminal>,
    services: Services,
    catalog: Arc<dyn ProductCatalog>,
    orchestrator: Arc<CheckoutOrchestrator>,
    prompt: ConsolePrompt,
}

impl Shell {
    pub fn new(
        terminal: Arc<dyn Terminal>,
        services: Services,
        catalog: Arc<dyn ProductCatalog>,
        orchestrator: Arc<CheckoutOrchestrator>,
        shipping: ShippingPolicy,
    ) -> Self {
        let prompt = ConsolePrompt::new(terminal.clone(), services.supervisor.clone(), shipping);
        Self {
            terminal,
            services,
            catalog,
            orchestrator,
            prompt,
        }
    }

    fn print(&self, text: &str) {
        self.terminal.print(text);
    }

    fn report(&self, error: impl std::fmt::Display) {
        self.print(&format!("Error: {error}"));
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        let line = self.terminal.read_line(prompt).await;
        self.services.supervisor.touch();
        line.map(|line| line.trim().to_string())
    }

    /// Runs until the user quits, the session ends, input closes or the
    /// application shuts down.
    pub async fn run(&self) -> ShellExit {
        self.print("Welcome. Type 'help' for the list of commands.");
        let gate = &self.services.gate;

        loop {
            if self.services.supervisor.has_ended() {
                return ShellExit::SessionEnded;
            }

            let line = match gate.identity() {
                Some(identity) => {
                    let prompt = format!("{}> ", identity.username);
                    tokio::select! {
                        biased;
                        () = gate.wait_session_end() => {
                            if !gate.is_active() {
                                return ShellExit::Shutdown;
                            }
                            self.print("Session ended.");
                            return ShellExit::SessionEnded;
                        }
                        line = self.terminal.read_line(&prompt) => line,
                    }
                }
                None => tokio::select! {
                    biased;
                    () = gate.wait_shutdown() => return ShellExit::Shutdown,
                    line = self.terminal.read_line("> ") => line,
                },
            };

            let Some(line) = line else {
                return ShellExit::InputClosed;
            };
            self.services.supervisor.touch();

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(message) => {
                    self.print(&message);
                    continue;
                }
            };
            if command.requires_session() && !gate.is_authenticated() {
                self.print("Please log in first.");
                continue;
            }
            if let Some(exit) = self.execute(command).await {
                return exit;
            }
        }
    }

    /// Runs one command. Returns `Some` when the shell should stop.
    pub async fn execute(&self, command: Command) -> Option<ShellExit> {
        match command {
            Command::Empty => {}
            Command::Help => self.print(HELP),
            Command::Login(username) => self.login(username).await,
            Command::Register => self.register().await,
            Command::Categories => self.categories().await,
            Command::List(category) => self.list(category.as_deref()).await,
            Command::Add {
                product_id,
                quantity,
            } => self.add(product_id, quantity).await,
            Command::Remove {
                product_id,
                quantity,
            } => self.remove(product_id, quantity).await,
            Command::Cart => {
                let cart = self.services.discounts.settled_snapshot().await;
                if cart.is_empty() {
                    self.print("Your cart is empty.");
                } else {
                    self.print(&cart.to_string());
                }
            }
            Command::Promo { percent, label } => {
                let cart = self
                    .services
                    .discounts
                    .apply_custom_discount(DiscountRate::from_percent(percent), label)
                    .await;
                self.print(&cart.to_string());
            }
            Command::NoPromo => {
                let cart = self.services.discounts.clear_discounts().await;
                self.print(&cart.to_string());
            }
            Command::Checkout => return self.checkout().await,
            Command::History => self.history().await,
            Command::Order(folio) => self.order(&folio).await,
            Command::Returns => match self.services.returns.returns().await {
                Ok(returns) if returns.is_empty() => self.print("No returns yet."),
                Ok(returns) => {
                    for ret in returns {
                        self.print(&ret.to_string());
                    }
                }
                Err(e) => self.report(e),
            },
            Command::Return(folio) => self.request_return(&folio).await,
            Command::Cards => self.cards().await,
            Command::AddCard => self.add_card().await,
            Command::Deactivate(card_id) => match self.services.cards.deactivate(card_id).await {
                Ok(()) => self.print(&format!("Card {card_id} deactivated.")),
                Err(e) => self.report(e),
            },
            Command::Logout => {
                self.services.supervisor.end_session();
                self.print("Goodbye.");
                return Some(ShellExit::SessionEnded);
            }
            Command::Quit => {
                self.services.supervisor.end_session();
                return Some(ShellExit::Quit);
            }
        }
        None
    }

    async fn login(&self, username: Option<String>) {
        if let Some(identity) = self.services.gate.identity() {
            self.print(&format!("Already signed in as {}.", identity.username));
            return;
        }
        let username = match username {
            Some(username) => username,
            None => match self.ask("Username: ").await {
                Some(username) => username,
                None => return,
            },
        };
        let Some(password) = self.ask("Password: ").await else {
            return;
        };

        match self.services.authenticator.login(&username, &password).await {
            Ok(identity) => self.print(&format!("Welcome, {}.", identity.username)),
            Err(e) => self.report(e),
        }
    }

    async fn register(&self) {
        let Some(username) = self.ask("Username: ").await else {
            return;
        };
        let Some(password) = self.ask("Password: ").await else {
            return;
        };
        match self.services.authenticator.register(&username, &password).await {
            Ok(_) => self.print("Account created. You can log in now."),
            Err(e) => self.report(e),
        }
    }

    async fn categories(&self) {
        match self.catalog.list_categories().await {
            Ok(categories) => {
                for category in categories {
                    self.print(&format!("  {category}"));
                }
            }
            Err(e) => self.report(e),
        }
    }

    async fn list(&self, category: Option<&str>) {
        let products = match category {
            Some(category) => self.catalog.list_by_category(category).await,
            None => self.catalog.list_all().await,
        };
        match products {
            Ok(products) if products.is_empty() => self.print("No products found."),
            Ok(products) => {
                for product in products {
                    self.print(&format!("  {product}  [{} in stock]", product.stock));
                }
            }
            Err(e) => self.report(e),
        }
    }

    async fn add(&self, product_id: ProductId, quantity: u32) {
        let product = match self.catalog.find_by_id(product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                self.print(&format!("Product {product_id} not found."));
                return;
            }
            Err(e) => {
                self.report(e);
                return;
            }
        };

        let in_cart = self
            .services
            .cart
            .snapshot()
            .await
            .get(product_id)
            .map_or(0, |item| item.quantity);
        if in_cart + quantity > product.stock {
            self.print(&format!(
                "Only {} of {} available.",
                product.stock.saturating_sub(in_cart),
                product.name
            ));
            return;
        }

        for _ in 0..quantity {
            self.services.cart.add_item(&product).await;
        }
        let cart = self.services.discounts.settled_snapshot().await;
        self.print(&format!(
            "Added {quantity} x {}. Cart total: {}",
            product.name, cart.total
        ));
    }

    async fn remove(&self, product_id: ProductId, quantity: u32) {
        let cart = self.services.cart.snapshot().await;
        if cart.get(product_id).is_none() {
            self.print(&format!("Product {product_id} is not in the cart."));
            return;
        }
        for _ in 0..quantity {
            self.services.cart.remove_item(product_id).await;
        }
        let cart = self.services.discounts.settled_snapshot().await;
        self.print(&format!("Cart total: {}", cart.total));
    }

    async fn checkout(&self) -> Option<ShellExit> {
        let report = match self.orchestrator.run(&self.prompt).await {
            Ok(report) => report,
            Err(e) => {
                self.report(e);
                return None;
            }
        };

        match report.outcome {
            CheckoutOutcome::Completed {
                choice: PostPurchaseChoice::Terminate,
                ..
            } => {
                self.print("Thank you for your purchase. Goodbye.");
                Some(ShellExit::SessionEnded)
            }
            CheckoutOutcome::Completed { .. } => None,
            CheckoutOutcome::Aborted { .. } => {
                self.print("Checkout cancelled. Your cart was kept.");
                None
            }
            CheckoutOutcome::Failed { error } => {
                self.print(&format!("Checkout failed: {error}. Your cart was kept."));
                None
            }
        }
    }

    async fn history(&self) {
        match self.services.history.orders().await {
            Ok(orders) if orders.is_empty() => self.print("No orders yet."),
            Ok(orders) => {
                for order in orders {
                    self.print(&format!("  {order}"));
                }
            }
            Err(e) => self.report(e),
        }
    }

    async fn find_order(&self, folio: &Folio) -> Option<Order> {
        match self.services.history.find_by_folio(folio).await {
            Ok(Some(order)) => Some(order),
            Ok(None) => {
                self.print(&format!("Order {folio} not found."));
                None
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    async fn order(&self, folio: &Folio) {
        let Some(order) = self.find_order(folio).await else {
            return;
        };

        let mut text = format!("Order {} ({})", order.folio, order.status);
        for line in &order.lines {
            text.push_str(&format!(
                "\n  {} x{} = {}",
                line.product_name,
                line.quantity,
                line.line_total()
            ));
        }
        text.push_str(&format!("\nSubtotal: {}", order.subtotal));
        if order.discount.is_positive() {
            text.push_str(&format!("\nDiscount: -{}", order.discount));
        }
        text.push_str(&format!(
            "\nShipping ({}): {}",
            order.shipping_mode.as_str(),
            order.shipping_cost
        ));
        text.push_str(&format!("\nTotal: {}", order.grand_total()));
        match self.services.history.payment_for(&order).await {
            Ok(Some(payment)) => text.push_str(&format!("\nPaid by: {}", payment.method)),
            Ok(None) => text.push_str("\nPaid by: no payment record"),
            Err(e) => tracing::warn!(folio = %order.folio, error = %e, "could not load payment"),
        }
        self.print(&text);
    }

    async fn request_return(&self, folio: &Folio) {
        let Some(order) = self.find_order(folio).await else {
            return;
        };
        self.print(&order.to_string());

        let mut menu = "Reason:".to_string();
        for (index, reason) in ReturnReason::ALL.iter().enumerate() {
            menu.push_str(&format!("\n  {}) {reason}", index + 1));
        }
        self.print(&menu);
        let Some(answer) = self.ask("Reason: ").await else {
            return;
        };
        let reason = match answer.parse::<usize>() {
            Ok(n) if (1..=ReturnReason::ALL.len()).contains(&n) => ReturnReason::ALL[n - 1],
            _ => match answer.parse::<ReturnReason>() {
                Ok(reason) => reason,
                Err(e) => {
                    self.report(e);
                    return;
                }
            },
        };

        let Some(answer) = self
            .ask(&format!("Refund amount [{}]: ", order.grand_total()))
            .await
        else {
            return;
        };
        let amount = if answer.is_empty() {
            order.grand_total()
        } else {
            match Money::parse(&answer) {
                Some(amount) => amount,
                None => {
                    self.print("Enter an amount such as 120.50.");
                    return;
                }
            }
        };
        let Some(note) = self.ask("Note (optional): ").await else {
            return;
        };

        self.print("Processing return...");
        match self
            .services
            .returns
            .request_return(&order.folio, reason, amount, &note)
            .await
        {
            Ok(ret) => self.print(&format!("Return registered: {ret}")),
            Err(e) => self.report(e),
        }
    }

    async fn cards(&self) {
        match self.services.cards.list_cards().await {
            Ok(cards) if cards.is_empty() => self.print("No active cards."),
            Ok(cards) => {
                for card in cards {
                    self.print(&format!("  [{}] {card}", card.id));
                }
            }
            Err(e) => self.report(e),
        }
    }

    async fn add_card(&self) {
        let Some(number) = self.ask("Card number: ").await else {
            return;
        };
        let Some(holder) = self.ask("Holder name: ").await else {
            return;
        };
        let Some(expiry) = self.ask("Expiry (MM/YY): ").await else {
            return;
        };
        let Some(brand) = self.ask("Brand (visa/mastercard): ").await else {
            return;
        };
        let brand = match brand.parse::<CardBrand>() {
            Ok(brand) => brand,
            Err(e) => {
                self.report(e);
                return;
            }
        };

        match self
            .services
            .cards
            .register_card(&number, &holder, &expiry, brand)
            .await
        {
            Ok(card) => self.print(&format!("Card registered: [{}] {card}", card.id)),
            Err(e) => self.report(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_commands() {
        assert_eq!(
            "add 3 2".parse::<Command>(),
            Ok(Command::Add {
                product_id: ProductId::new(3),
                quantity: 2
            })
        );
        assert_eq!(
            "REMOVE 3".parse::<Command>(),
            Ok(Command::Remove {
                product_id: ProductId::new(3),
                quantity: 1
            })
        );
        assert!("add".parse::<Command>().is_err());
        assert!("add 3 0".parse::<Command>().is_err());
        assert!("add x".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_list_keeps_multiword_category() {
        assert_eq!(
            "list Productos de Limpieza".parse::<Command>(),
            Ok(Command::List(Some("Productos de Limpieza".to_string())))
        );
        assert_eq!("list".parse::<Command>(), Ok(Command::List(None)));
    }

    #[test]
    fn test_parse_promo() {
        assert_eq!(
            "promo 25% Buen Fin".parse::<Command>(),
            Ok(Command::Promo {
                percent: 25,
                label: "Buen Fin".to_string()
            })
        );
        assert_eq!(
            "promo 5".parse::<Command>(),
            Ok(Command::Promo {
                percent: 5,
                label: "5% promotion".to_string()
            })
        );
        assert!("promo 150".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!("".parse::<Command>(), Ok(Command::Empty));
        assert_eq!(
            "login ana".parse::<Command>(),
            Ok(Command::Login(Some("ana".to_string())))
        );
        assert_eq!(
            "order ORD-1".parse::<Command>(),
            Ok(Command::Order(Folio::new("ORD-1")))
        );
        assert_eq!(
            "deactivate 4".parse::<Command>(),
            Ok(Command::Deactivate(CardId::new(4)))
        );
        assert!("fly".parse::<Command>().is_err());
    }

    #[test]
    fn test_session_requirements() {
        assert!(!Command::Help.requires_session());
        assert!(!Command::List(None).requires_session());
        assert!(Command::Checkout.requires_session());
        assert!(Command::Cart.requires_session());
    }
}
