//! Marketplace order ledger.
//!
//! Every transition follows the same sequence: take the per-order lock,
//! locate the row from a fresh read, check the edge against the status just
//! read, write the metadata cells and then the status cell, and only then run
//! side effects. The status write is the commit point. A repeated edge whose
//! target status is already stored reports `AlreadyApplied` and runs nothing,
//! which is what keeps a retried payment webhook from decrementing stock
//! twice.

use std::sync::Arc;

use kemah_store::{locate, FieldUpdate, RecordStore, SchemaStatus};
use kemah_types::{OrderEdge, OrderId, OrderStatus, Rupiah};

use crate::buyer::{same_email, Buyer};
use crate::collaborators::{notify_best_effort, Catalog, Notification, Notifier};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::KeyedLocks;
use crate::order::{CancelRequest, NewOrder, Order, PaymentSource, RefundRequest};
use crate::outcome::Transition;
use crate::rows::{require_columns, timestamp, unique_code};
use crate::schema::order as col;

/// Returns `true` if `status` is the target of `edge`, i.e. the edge has
/// already been taken.
fn reached_by(status: OrderStatus, edge: OrderEdge) -> bool {
    OrderStatus::ALL
        .iter()
        .any(|from| from.transition(edge) == Some(status))
}

/// State machine and side-effect orchestration for marketplace orders.
pub struct OrderLedger {
    store: Arc<dyn RecordStore>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    table: String,
    locks: KeyedLocks,
}

impl OrderLedger {
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            table: table.into(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Provision the orders table.
    pub async fn ensure_schema(&self) -> LedgerResult<SchemaStatus> {
        Ok(self.store.ensure_schema(&self.table, &col::HEADERS).await?)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Place a new order in `Pending Payment`.
    ///
    /// Price and supplier come from the catalog. Stock is checked here but
    /// only decremented when the order is paid.
    pub async fn create(&self, request: NewOrder, buyer: &Buyer) -> LedgerResult<Order> {
        let item = request.item_name.trim();
        if item.is_empty() {
            return Err(LedgerError::Validation("item name is required".into()));
        }
        if request.quantity == 0 {
            return Err(LedgerError::Validation("quantity must be at least 1".into()));
        }
        if buyer.email.trim().is_empty() {
            return Err(LedgerError::Validation("buyer email is required".into()));
        }

        let product = self
            .catalog
            .find_product(item)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound {
                table: "catalog".into(),
                id: item.to_string(),
            })?;
        if product.discontinued {
            return Err(LedgerError::Unavailable(product.name));
        }
        if product.stock < u64::from(request.quantity) {
            return Err(LedgerError::InsufficientStock {
                item: product.name,
                available: product.stock,
                requested: request.quantity,
            });
        }

        self.store.ensure_schema(&self.table, &col::HEADERS).await?;
        let grid = self.store.read_table(&self.table).await?;
        require_columns(&grid, &self.table, &[col::ID, col::STATUS])?;
        let id = unique_code(&grid, col::ID, OrderId::generate)?;

        let order = Order {
            id,
            item_name: product.name.clone(),
            unit_price: product.unit_price,
            quantity: request.quantity,
            total_price: product.unit_price * request.quantity,
            buyer_name: buyer.name.trim().to_string(),
            buyer_email: buyer.email.trim().to_string(),
            buyer_phone: request.phone.trim().to_string(),
            supplier_name: product.supplier_name.clone(),
            supplier_phone: product.supplier_phone.clone(),
            supplier_email: product.supplier_email.clone(),
            status: OrderStatus::PendingPayment,
            date: timestamp(),
            payment_proof: String::new(),
            resi: String::new(),
            shipment_proof: String::new(),
            cancellation: None,
            refund: None,
            stock_pending: false,
        };
        let row = grid.layout_row(&[
            (col::ID, order.id.to_string()),
            (col::ITEM_NAME, order.item_name.clone()),
            (col::UNIT_PRICE, order.unit_price.to_idr()),
            (col::QUANTITY, order.quantity.to_string()),
            (col::TOTAL_PRICE, order.total_price.to_idr()),
            (col::USER_NAME, order.buyer_name.clone()),
            (col::USER_EMAIL, order.buyer_email.clone()),
            (col::PHONE, order.buyer_phone.clone()),
            (col::SUPPLIER_NAME, order.supplier_name.clone()),
            (col::SUPPLIER_PHONE, order.supplier_phone.clone()),
            (col::SUPPLIER_EMAIL, order.supplier_email.clone()),
            (col::STATUS, order.status.as_str().to_string()),
            (col::DATE, order.date.clone()),
        ]);
        self.store.append(&self.table, &row).await?;
        tracing::info!(
            order_id = %order.id,
            item = %order.item_name,
            quantity = order.quantity,
            total = %order.total_price,
            "order created"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            Notification::OrderCreated {
                order: order.clone(),
            },
        )
        .await;
        Ok(order)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Buyer uploaded a manual transfer proof: Pending Payment → Verifying
    /// Payment.
    pub async fn upload_proof(&self, id: &str, proof_ref: &str) -> LedgerResult<Transition<Order>> {
        let proof_ref = proof_ref.trim();
        if proof_ref.is_empty() {
            return Err(LedgerError::Validation("payment proof is required".into()));
        }
        self.apply(id, OrderEdge::UploadProof, |order| {
            order.payment_proof = proof_ref.to_string();
            Ok(vec![FieldUpdate::appendable(col::PAYMENT_PROOF, proof_ref)])
        })
        .await
    }

    /// Payment confirmed by the gateway or verified by an officer.
    ///
    /// The status commit also writes `Stock Decremented = No`; the marker
    /// flips to `Yes` once the catalog accepts the decrement. A failed
    /// decrement is retried by the next `mark_paid` on the same order, so
    /// stock moves exactly once however the payment signals arrive.
    pub async fn mark_paid(&self, id: &str, source: PaymentSource) -> LedgerResult<Transition<Order>> {
        let id = OrderId::parse(id)?;
        let _guard = self.locks.lock(id.as_str()).await;
        let mut transition = self
            .apply_locked(&id, OrderEdge::MarkPaid, |order| {
                order.stock_pending = true;
                Ok(vec![FieldUpdate::appendable(col::STOCK_DECREMENTED, col::STOCK_PENDING)])
            })
            .await?;
        if transition.record.status == OrderStatus::Paid && transition.record.stock_pending {
            if !transition.outcome.is_applied() {
                tracing::info!(order_id = %id, "retrying stock decrement");
            }
            self.decrement_stock(&mut transition.record, source).await;
        }
        Ok(transition)
    }

    /// Decrement stock for a paid order and record that it happened. Errors
    /// are logged; the marker stays `No` so the next payment signal retries.
    async fn decrement_stock(&self, order: &mut Order, source: PaymentSource) {
        let remaining = match self.catalog.decrement_stock(&order.item_name, order.quantity).await {
            Ok(remaining) => remaining,
            Err(err) => {
                tracing::error!(
                    order_id = %order.id,
                    %source,
                    item = %order.item_name,
                    error = %err,
                    "stock decrement failed after payment"
                );
                return;
            }
        };
        tracing::info!(
            order_id = %order.id,
            %source,
            item = %order.item_name,
            quantity = order.quantity,
            remaining,
            "stock decremented"
        );
        let marked = match locate(self.store.as_ref(), &self.table, col::ID, order.id.as_str()).await {
            Ok(mut location) => {
                location
                    .write(
                        self.store.as_ref(),
                        &[FieldUpdate::appendable(col::STOCK_DECREMENTED, col::STOCK_DONE)],
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        match marked {
            Ok(()) => order.stock_pending = false,
            Err(err) => tracing::error!(
                order_id = %order.id,
                error = %err,
                "stock decremented but marker not written"
            ),
        }
    }

    /// Paid → Ready to Ship, then tell the seller.
    pub async fn notify_seller(&self, id: &str) -> LedgerResult<Transition<Order>> {
        let transition = self.apply(id, OrderEdge::NotifySeller, |_| Ok(Vec::new())).await?;
        if transition.outcome.is_applied() {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::SellerNotified {
                    order: transition.record.clone(),
                },
            )
            .await;
        }
        Ok(transition)
    }

    /// Ready to Ship → On Shipment, recording the tracking number.
    pub async fn ship(
        &self,
        id: &str,
        tracking_ref: &str,
        proof: Option<&str>,
    ) -> LedgerResult<Transition<Order>> {
        let tracking_ref = tracking_ref.trim();
        if tracking_ref.is_empty() {
            return Err(LedgerError::Validation("tracking number (resi) is required".into()));
        }
        let proof = proof.map(str::trim).filter(|p| !p.is_empty());
        self.apply(id, OrderEdge::Ship, |order| {
            order.resi = tracking_ref.to_string();
            let mut updates = vec![FieldUpdate::appendable(col::RESI, tracking_ref)];
            if let Some(proof) = proof {
                order.shipment_proof = proof.to_string();
                updates.push(FieldUpdate::appendable(col::SHIPMENT_PROOF, proof));
            }
            Ok(updates)
        })
        .await
    }

    /// On Shipment → Item Received.
    pub async fn confirm_receipt(&self, id: &str) -> LedgerResult<Transition<Order>> {
        self.apply(id, OrderEdge::ConfirmReceipt, |_| Ok(Vec::new())).await
    }

    /// Item Received → Settled.
    pub async fn settle(&self, id: &str) -> LedgerResult<Transition<Order>> {
        self.apply(id, OrderEdge::Settle, |_| Ok(Vec::new())).await
    }

    /// Cancel an order that has not shipped yet.
    pub async fn cancel(&self, id: &str, request: &CancelRequest) -> LedgerResult<Transition<Order>> {
        let notes = request.note.as_deref().map(str::trim).unwrap_or("");
        let by = request.by.trim();
        let transition = self
            .apply(id, OrderEdge::Cancel, |order| {
                let date = timestamp();
                order.cancellation = Some(crate::order::Cancellation {
                    reason: request.reason.as_str().to_string(),
                    notes: notes.to_string(),
                    by: by.to_string(),
                    date: date.clone(),
                });
                Ok(vec![
                    FieldUpdate::appendable(col::CANCELLATION_REASON, request.reason.as_str()),
                    FieldUpdate::appendable(col::CANCELLATION_NOTES, notes),
                    FieldUpdate::appendable(col::CANCELLED_BY, by),
                    FieldUpdate::appendable(col::CANCELLED_DATE, date),
                ])
            })
            .await?;
        if transition.outcome.is_applied() {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::OrderCancelled {
                    order: transition.record.clone(),
                },
            )
            .await;
        }
        Ok(transition)
    }

    /// Cancelled → Refunded.
    ///
    /// The officer must confirm the amount; when no amount is given the
    /// order total is refunded.
    pub async fn refund(&self, id: &str, request: &RefundRequest) -> LedgerResult<Transition<Order>> {
        if !request.confirmed {
            return Err(LedgerError::Validation("refund amount must be confirmed".into()));
        }
        let method = request.method.trim();
        if method.is_empty() {
            return Err(LedgerError::Validation("refund method is required".into()));
        }
        let proof = request.proof.as_deref().map(str::trim).unwrap_or("");
        let notes = request.notes.as_deref().map(str::trim).unwrap_or("");
        let by = request.by.trim();

        let transition = self
            .apply(id, OrderEdge::Refund, |order| {
                let amount = request.amount.unwrap_or(order.total_price);
                if amount.is_zero() {
                    return Err(LedgerError::Validation("refund amount must be positive".into()));
                }
                if amount > order.total_price {
                    return Err(LedgerError::Validation(format!(
                        "refund {amount} exceeds order total {}",
                        order.total_price
                    )));
                }
                let date = timestamp();
                order.refund = Some(crate::order::Refund {
                    amount,
                    method: method.to_string(),
                    date: date.clone(),
                    proof: proof.to_string(),
                    notes: notes.to_string(),
                    by: by.to_string(),
                });
                Ok(vec![
                    FieldUpdate::appendable(col::REFUND_AMOUNT, amount.to_idr()),
                    FieldUpdate::appendable(col::REFUND_METHOD, method),
                    FieldUpdate::appendable(col::REFUND_DATE, date),
                    FieldUpdate::appendable(col::REFUND_PROOF, proof),
                    FieldUpdate::appendable(col::REFUND_NOTES, notes),
                    FieldUpdate::appendable(col::REFUNDED_BY, by),
                ])
            })
            .await?;
        if transition.outcome.is_applied() {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::OrderRefunded {
                    order: transition.record.clone(),
                },
            )
            .await;
        }
        Ok(transition)
    }

    /// Settled | Refunded → Archived.
    pub async fn archive(&self, id: &str) -> LedgerResult<Transition<Order>> {
        self.apply(id, OrderEdge::Archive, |_| Ok(Vec::new())).await
    }

    async fn apply<F>(&self, id: &str, edge: OrderEdge, fields: F) -> LedgerResult<Transition<Order>>
    where
        F: FnOnce(&mut Order) -> LedgerResult<Vec<FieldUpdate>> + Send,
    {
        let id = OrderId::parse(id)?;
        let _guard = self.locks.lock(id.as_str()).await;
        self.apply_locked(&id, edge, fields).await
    }

    /// [`apply`](Self::apply) for a caller already holding the order's lock.
    async fn apply_locked<F>(&self, id: &OrderId, edge: OrderEdge, fields: F) -> LedgerResult<Transition<Order>>
    where
        F: FnOnce(&mut Order) -> LedgerResult<Vec<FieldUpdate>> + Send,
    {
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, id.as_str()).await?;
        let mut order = Order::from_record(location.record())?;
        let from = order.status;

        let Some(to) = from.transition(edge) else {
            if reached_by(from, edge) {
                tracing::debug!(order_id = %id, %edge, status = %from, "edge already applied");
                return Ok(Transition::already_applied(order));
            }
            return Err(LedgerError::InvalidTransition {
                id: id.to_string(),
                from: from.to_string(),
                edge: edge.to_string(),
            });
        };

        let mut updates = fields(&mut order)?;
        updates.push(FieldUpdate::required(col::STATUS, to.as_str()));
        location.write(self.store.as_ref(), &updates).await?;
        order.status = to;

        tracing::info!(order_id = %id, %edge, %from, %to, "order transition");
        Ok(Transition::applied(order))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get(&self, id: &str) -> LedgerResult<Order> {
        let id = OrderId::parse(id)?;
        let location = locate(self.store.as_ref(), &self.table, col::ID, id.as_str()).await?;
        Order::from_record(location.record())
    }

    /// Like [`get`](Self::get), but an unknown id is `None` rather than an
    /// error.
    pub async fn find(&self, id: &str) -> LedgerResult<Option<Order>> {
        match self.get(id).await {
            Ok(order) => Ok(Some(order)),
            Err(LedgerError::RecordNotFound { .. }) | Err(LedgerError::Validation(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every order in sheet order. Blank rows are skipped and malformed rows
    /// are logged and skipped.
    pub async fn list(&self) -> LedgerResult<Vec<Order>> {
        let records = self.store.read_all(&self.table).await?;
        let mut orders = Vec::with_capacity(records.len());
        for record in &records {
            if record.get(col::ID).is_empty() {
                continue;
            }
            match Order::from_record(record) {
                Ok(order) => orders.push(order),
                Err(err) => tracing::warn!(table = %self.table, error = %err, "skipping malformed order row"),
            }
        }
        Ok(orders)
    }

    pub async fn list_for_buyer(&self, email: &str) -> LedgerResult<Vec<Order>> {
        let mut orders = self.list().await?;
        orders.retain(|order| same_email(&order.buyer_email, email));
        Ok(orders)
    }

    /// Sum of totals per status, for officer dashboards.
    pub async fn totals_by_status(&self) -> LedgerResult<Vec<(OrderStatus, Rupiah)>> {
        let orders = self.list().await?;
        Ok(OrderStatus::ALL
            .iter()
            .map(|status| {
                let total = orders
                    .iter()
                    .filter(|o| o.status == *status)
                    .fold(0u64, |acc, o| acc.saturating_add(o.total_price.amount()));
                (*status, Rupiah(total))
            })
            .collect())
    }
}

impl std::fmt::Debug for OrderLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLedger")
            .field("table", &self.table)
            .field("locks", &self.locks)
            .finish()
    }
}
