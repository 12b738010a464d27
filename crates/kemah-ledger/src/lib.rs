//! Order and booking ledgers over the Kemah record store.
//!
//! Each ledger owns one table and drives its records through a lifecycle:
//! marketplace orders from Pending Payment through Settled (or Cancelled and
//! Refunded) to Archived, event bookings from Pending Payment to Confirmed
//! Payment and check-in. Every transition re-reads the live row, checks the
//! edge against the current status, writes metadata before status, and only
//! then runs side effects (stock decrement, tickets, notifications).
//!
//! # Key Types
//!
//! - [`OrderLedger`] / [`BookingLedger`] -- the two state machines
//! - [`Transition`] -- outcome of a transition plus the record after it
//! - [`Catalog`], [`Notifier`], [`TicketRenderer`], [`PaymentGateway`] -- collaborator seams
//! - [`Checkout`] -- gateway sessions billed from the stored amount
//! - [`Tables`] -- configurable table (sheet tab) names
//!
//! Duplicate or concurrent transition requests for one record are serialized
//! by [`KeyedLocks`]; a request whose target status is already current
//! returns [`TransitionOutcome::AlreadyApplied`] without writing.

pub mod booking;
pub mod bookings;
pub mod buyer;
pub mod catalog;
pub mod checkout;
pub mod collaborators;
pub mod error;
pub mod locks;
pub mod order;
pub mod orders;
pub mod outcome;
pub mod pricing;
pub mod schema;

mod rows;

pub use booking::{lot_is_assigned, Booking, BookingRequest};
pub use bookings::BookingLedger;
pub use buyer::Buyer;
pub use catalog::{InMemoryCatalog, SheetCatalog};
pub use checkout::{retry_id, Attempt, Checkout};
pub use collaborators::{
    Catalog, ChargeItem, ChargeRequest, Customer, DisabledPaymentGateway, DisabledTicketRenderer,
    HttpTicketRenderer, LogNotifier, Notification, Notifier, PaymentGateway, PaymentSession, Product,
    SnapPaymentGateway, TicketRenderer, TicketRequest,
};
pub use error::{LedgerError, LedgerResult};
pub use locks::KeyedLocks;
pub use order::{CancelReason, CancelRequest, Cancellation, NewOrder, Order, PaymentSource, Refund, RefundRequest};
pub use orders::OrderLedger;
pub use outcome::{Transition, TransitionOutcome};
pub use pricing::{find_event, Event};
pub use schema::Tables;
