use std::sync::Arc;

use kemah_ledger::{Booking, BookingLedger, LedgerError, Order, OrderLedger, PaymentSource, Transition};
use serde::Serialize;

use crate::error::{ReconcileError, ReconcileResult};
use crate::notification::{strip_retry_suffix, GatewayNotification, PaymentOutcome};

/// Which ledger a payment belonged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTarget {
    Booking,
    Order,
}

/// What reconciling one notification did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reconciliation {
    /// The record moved to its paid status.
    Applied { target: PaymentTarget, id: String },
    /// The record was already paid; nothing ran.
    AlreadyApplied { target: PaymentTarget, id: String },
    /// A non-final outcome was recorded in the log only.
    Observed { id: String, outcome: PaymentOutcome },
    /// No booking or order carries this id.
    NotFound { id: String },
    /// The ledger refused the transition (the order was cancelled, say).
    Rejected {
        target: PaymentTarget,
        id: String,
        reason: String,
    },
}

/// Applies gateway payment outcomes to the booking and order ledgers.
pub struct PaymentReconciler {
    bookings: Arc<BookingLedger>,
    orders: Arc<OrderLedger>,
    server_key: Option<String>,
}

impl PaymentReconciler {
    pub fn new(bookings: Arc<BookingLedger>, orders: Arc<OrderLedger>) -> Self {
        Self {
            bookings,
            orders,
            server_key: None,
        }
    }

    /// Require notifications to carry a signature made with `server_key`.
    /// Blank keys are ignored.
    pub fn with_server_key(mut self, server_key: impl Into<String>) -> Self {
        let key = server_key.into();
        self.server_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    pub fn verifies_signatures(&self) -> bool {
        self.server_key.is_some()
    }

    /// Authenticate and reconcile a decoded gateway notification.
    pub async fn handle(&self, notification: &GatewayNotification) -> ReconcileResult<Reconciliation> {
        if let Some(key) = &self.server_key {
            notification.verify(key)?;
        }
        self.reconcile(&notification.order_id, notification.outcome()).await
    }

    /// Apply `outcome` to whichever record `external_id` names.
    ///
    /// Bookings are searched before orders. Only infrastructure faults are
    /// returned as errors.
    pub async fn reconcile(&self, external_id: &str, outcome: PaymentOutcome) -> ReconcileResult<Reconciliation> {
        let id = strip_retry_suffix(external_id).to_string();
        if outcome != PaymentOutcome::Success {
            tracing::info!(external_id, %outcome, "payment not settled; no change");
            return Ok(Reconciliation::Observed { id, outcome });
        }

        match self.bookings.find(&id).await {
            Ok(Some(_)) => {
                let result = self.bookings.confirm_payment(&id, None).await;
                return settle(PaymentTarget::Booking, id, result);
            }
            Ok(None) => {}
            Err(err) => return settle(PaymentTarget::Booking, id, Err::<Transition<Booking>, _>(err)),
        }
        match self.orders.find(&id).await {
            Ok(Some(_)) => {
                let result = self.orders.mark_paid(&id, PaymentSource::Gateway).await;
                return settle(PaymentTarget::Order, id, result);
            }
            Ok(None) => {}
            Err(err) => return settle(PaymentTarget::Order, id, Err::<Transition<Order>, _>(err)),
        }

        tracing::warn!(external_id, "payment for unknown booking or order");
        Ok(Reconciliation::NotFound { id })
    }
}

fn settle<T>(
    target: PaymentTarget,
    id: String,
    result: Result<Transition<T>, LedgerError>,
) -> ReconcileResult<Reconciliation> {
    match result {
        Ok(transition) if transition.outcome.is_applied() => {
            tracing::info!(?target, id = %id, "payment reconciled");
            Ok(Reconciliation::Applied { target, id })
        }
        Ok(_) => {
            tracing::info!(?target, id = %id, "duplicate payment notification");
            Ok(Reconciliation::AlreadyApplied { target, id })
        }
        // A row that no longer parses will not parse on a redelivery either.
        Err(err) if err.is_domain() || matches!(err, LedgerError::Malformed { .. }) => {
            tracing::warn!(?target, id = %id, error = %err, "payment refused by ledger");
            Ok(Reconciliation::Rejected {
                target,
                id,
                reason: err.to_string(),
            })
        }
        Err(err) => Err(ReconcileError::Ledger(err)),
    }
}

impl std::fmt::Debug for PaymentReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentReconciler")
            .field("orders", &self.orders.table())
            .field("bookings", &self.bookings.table())
            .field("verifies_signatures", &self.verifies_signatures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kemah_ledger::{
        BookingRequest, Buyer, CancelReason, CancelRequest, DisabledTicketRenderer, InMemoryCatalog, LogNotifier,
        NewOrder, Product,
    };
    use kemah_store::InMemoryRecordStore;
    use kemah_types::{BookingStatus, MembershipTier, OrderStatus, Rupiah};

    struct Fixture {
        store: Arc<InMemoryRecordStore>,
        catalog: Arc<InMemoryCatalog>,
        orders: Arc<OrderLedger>,
        bookings: Arc<BookingLedger>,
        reconciler: PaymentReconciler,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new().with_table(
            "Events",
            &["ID", "Activity", "price_alumni", "price_new_member"],
            &[&["EV-1", "Kemah Akbar", "100000", "150000"]],
        ));
        let catalog = Arc::new(InMemoryCatalog::new().with_product(Product {
            name: "Tenda Dome".into(),
            unit_price: Rupiah(150_000),
            stock: 10,
            discontinued: false,
            supplier_name: "Toko Kemah".into(),
            supplier_phone: "0811".into(),
            supplier_email: "toko@example.com".into(),
        }));
        let orders = Arc::new(OrderLedger::new(
            store.clone(),
            catalog.clone(),
            Arc::new(LogNotifier),
            "Market OB",
        ));
        let bookings = Arc::new(BookingLedger::new(
            store.clone(),
            Arc::new(DisabledTicketRenderer),
            Arc::new(LogNotifier),
            "Event Reservation",
            "Events",
        ));
        orders.ensure_schema().await.unwrap();
        bookings.ensure_schema().await.unwrap();
        let reconciler = PaymentReconciler::new(bookings.clone(), orders.clone());
        Fixture {
            store,
            catalog,
            orders,
            bookings,
            reconciler,
        }
    }

    fn buyer() -> Buyer {
        Buyer::new("Siti", "siti@example.com", MembershipTier::Alumni)
    }

    fn new_order(quantity: u32) -> NewOrder {
        NewOrder {
            item_name: "Tenda Dome".into(),
            quantity,
            phone: "0812".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_success_decrements_stock_once() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(3), &buyer()).await.unwrap();
        let id = order.id.to_string();

        let first = fx.reconciler.reconcile(&id, PaymentOutcome::Success).await.unwrap();
        assert_eq!(
            first,
            Reconciliation::Applied {
                target: PaymentTarget::Order,
                id: id.clone()
            }
        );
        let second = fx.reconciler.reconcile(&id, PaymentOutcome::Success).await.unwrap();
        assert_eq!(
            second,
            Reconciliation::AlreadyApplied {
                target: PaymentTarget::Order,
                id: id.clone()
            }
        );

        assert_eq!(fx.catalog.stock("Tenda Dome"), Some(7));
        assert_eq!(fx.catalog.decrement_count(), 1);
        assert_eq!(fx.orders.get(&id).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn bookings_are_confirmed() {
        let fx = fixture().await;
        let request = BookingRequest {
            event_id: "EV-1".into(),
            participants: Some(2),
            ..BookingRequest::default()
        };
        let booking = fx.bookings.create(request, &buyer()).await.unwrap();
        let retried = format!("{}-R0042", booking.code);

        let result = fx.reconciler.reconcile(&retried, PaymentOutcome::Success).await.unwrap();
        assert_eq!(
            result,
            Reconciliation::Applied {
                target: PaymentTarget::Booking,
                id: booking.code.to_string()
            }
        );
        let stored = fx.bookings.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
    }

    #[tokio::test]
    async fn pending_and_failure_change_nothing() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(1), &buyer()).await.unwrap();
        let id = order.id.to_string();
        let writes = fx.store.write_count();
        for outcome in [PaymentOutcome::Pending, PaymentOutcome::Failure] {
            let result = fx.reconciler.reconcile(&id, outcome).await.unwrap();
            assert_eq!(result, Reconciliation::Observed { id: id.clone(), outcome });
        }
        assert_eq!(fx.store.write_count(), writes);
        assert_eq!(fx.orders.get(&id).await.unwrap().status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let fx = fixture().await;
        let result = fx.reconciler.reconcile("ZZZZ9999", PaymentOutcome::Success).await.unwrap();
        assert_eq!(result, Reconciliation::NotFound { id: "ZZZZ9999".into() });
    }

    #[tokio::test]
    async fn cancelled_order_is_rejected_not_failed() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(1), &buyer()).await.unwrap();
        let id = order.id.to_string();
        let cancel = CancelRequest {
            reason: CancelReason::BuyerRequest,
            note: None,
            by: "siti@example.com".into(),
        };
        fx.orders.cancel(&id, &cancel).await.unwrap();

        let result = fx.reconciler.reconcile(&id, PaymentOutcome::Success).await.unwrap();
        assert!(matches!(result, Reconciliation::Rejected { target: PaymentTarget::Order, .. }));
        assert_eq!(fx.catalog.decrement_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_row_is_rejected_not_failed() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(1), &buyer()).await.unwrap();
        let table = fx.store.snapshot("Market OB").unwrap();
        let row = table.find_row(0, order.id.as_str()).unwrap();
        let status = table.column_index("Status").unwrap();
        fx.store
            .edit_cell("Market OB", kemah_store::CellRef::new(row, status), "lunas?")
            .unwrap();

        let result = fx.reconciler.reconcile(order.id.as_str(), PaymentOutcome::Success).await.unwrap();
        assert!(matches!(result, Reconciliation::Rejected { target: PaymentTarget::Order, .. }));
        assert_eq!(fx.catalog.decrement_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_propagates() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(1), &buyer()).await.unwrap();
        fx.store.set_unavailable(true);
        let err = fx
            .reconciler
            .reconcile(order.id.as_str(), PaymentOutcome::Success)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store_unavailable");
    }

    #[tokio::test]
    async fn signed_notifications() {
        let fx = fixture().await;
        let order = fx.orders.create(new_order(1), &buyer()).await.unwrap();
        let reconciler = PaymentReconciler::new(fx.bookings.clone(), fx.orders.clone()).with_server_key("sk-test");
        assert!(reconciler.verifies_signatures());

        let mut notification = GatewayNotification {
            order_id: order.id.to_string(),
            transaction_status: "settlement".into(),
            fraud_status: None,
            status_code: "200".into(),
            gross_amount: "150000.00".into(),
            signature_key: "forged".into(),
        };
        assert!(matches!(
            reconciler.handle(&notification).await,
            Err(ReconcileError::InvalidSignature(_))
        ));
        assert_eq!(fx.catalog.decrement_count(), 0);

        notification.signature_key = notification.expected_signature("sk-test");
        let result = reconciler.handle(&notification).await.unwrap();
        assert!(matches!(result, Reconciliation::Applied { .. }));

        assert!(!PaymentReconciler::new(fx.bookings.clone(), fx.orders.clone())
            .with_server_key("  ")
            .verifies_signatures());
    }
}
