//! Background workers of the checkout simulator.
//!
//! Every worker follows the same gated lifecycle (see [`worker`]): it idles
//! until a user signs in through [`Authenticator`], runs for the length of
//! the session, and stops when the session ends or the application shuts
//! down. The services also expose methods the foreground and the checkout
//! pipeline call directly.

pub mod auth;
pub mod cards;
pub mod config;
pub mod discount;
pub mod error;
pub mod gate;
pub mod history;
pub mod recalculator;
pub mod returns;
pub mod services;
pub mod session;
pub mod worker;

pub use auth::{Authenticator, MIN_PASSWORD_LEN};
pub use cards::{ApprovalSource, CardService, ChargeReceipt, FixedApproval, RandomApproval};
pub use config::WorkerConfig;
pub use discount::{CustomDiscount, DiscountEngine};
pub use error::{Result, WorkerError};
pub use gate::{Identity, SessionGate};
pub use history::PurchaseHistory;
pub use recalculator::{PriceRecalculator, TotalsListener};
pub use returns::ReturnsService;
pub use services::Services;
pub use session::SessionSupervisor;
pub use worker::{ShutdownReport, Worker, WorkerSet, WorkerState};
