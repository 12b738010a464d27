//! HTTP API for the Kemah ledgers.
//!
//! Serves the buyer and officer endpoints for marketplace orders and event
//! bookings, plus the payment gateway webhook. Identity is asserted by the
//! upstream identity provider through trusted headers; officer endpoints
//! additionally check the officer roster table.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{Identity, OfficerRoster, SheetOfficerRoster, StaticOfficerRoster};
pub use config::{AppConfig, GatewayConfig, ServerConfig, StoreBackend, TicketsConfig};
pub use error::{ServerError, ServerResult};
pub use server::KemahServer;
pub use state::{AppState, Services};
