//! Checkout orchestration for the retail simulator.
//!
//! A checkout attempt moves through these steps:
//! 1. Confirm and choose shipping (validated and priced)
//! 2. Choose a card or cash
//! 3. Charge the grand total
//! 4. Persist the order and its payment record
//! 5. Confirm the purchase and render the receipt
//! 6. Clear the cart and ask what to do next
//!
//! Cancelling a choice aborts the attempt and leaves the cart as it was. A
//! failed charge ends the attempt the same way. A failure to persist after a
//! successful charge is reported as a warning on an otherwise completed
//! purchase.

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod ports;
pub mod receipt;
pub mod state;

pub use adapters::{CheckoutPorts, SettledCart};
pub use config::CheckoutConfig;
pub use context::CheckoutContext;
pub use error::{CheckoutError, Result};
pub use events::{AbortReason, CheckoutEvent};
pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome, CheckoutReport};
pub use ports::{
    CardCharger, CartAccess, CheckoutPrompt, Decision, OrderPersister, PaymentChoice,
    PostPurchaseChoice, ReceiptRenderer, SessionControl, ShippingPricer, ShippingQuote,
};
pub use receipt::TextReceipt;
pub use state::CheckoutState;
