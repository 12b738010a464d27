//! Payment reconciliation for the Kemah ledgers.
//!
//! The payment gateway reports outcomes asynchronously, may deliver the same
//! notification more than once, and knows records only by the id it was
//! given at checkout. [`PaymentReconciler`] turns each notification into at
//! most one `confirm_payment` (bookings) or `mark_paid` (orders) transition.
//!
//! Domain refusals come back as [`Reconciliation::Rejected`] so the gateway
//! stops retrying; infrastructure faults are returned as
//! [`ReconcileError`] so it tries again later.

pub mod error;
pub mod notification;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult};
pub use notification::{strip_retry_suffix, GatewayNotification, PaymentOutcome};
pub use reconciler::{PaymentReconciler, PaymentTarget, Reconciliation};
