//! Foundation types for the Kemah ledgers.
//!
//! Everything stored in the backing spreadsheet is text. This crate holds the
//! typed vocabulary that the ledgers parse that text into, and render it back
//! from, at the store boundary.
//!
//! # Key Types
//!
//! - [`OrderId`] / [`TicketCode`] -- 8-character uppercase record identifiers
//! - [`OrderStatus`] / [`OrderEdge`] -- marketplace order state machine
//! - [`BookingStatus`] / [`BookingEdge`] -- event reservation state machine
//! - [`MembershipTier`] -- pricing tier of a buyer
//! - [`Rupiah`] -- whole-rupiah amounts parsed leniently from sheet cells

pub mod error;
pub mod ids;
pub mod member;
pub mod money;
pub mod status;

pub use error::TypeError;
pub use ids::{OrderId, TicketCode};
pub use member::MembershipTier;
pub use money::Rupiah;
pub use status::{BookingEdge, BookingStatus, OrderEdge, OrderStatus};
