//! HTTP handlers.
//!
//! Buyer endpoints act on the caller's own records; officer endpoints
//! require the caller to be on the officer roster. Ledger refusals become
//! JSON error bodies through [`ServerError`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use kemah_ledger::{
    Attempt, Booking, BookingRequest, CancelRequest, NewOrder, Order, PaymentSession, PaymentSource,
    RefundRequest, Transition,
};
use kemah_reconcile::{GatewayNotification, Reconciliation};
use kemah_types::{BookingStatus, OrderStatus, Rupiah};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::Identity;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

type Shared = State<Arc<AppState>>;

async fn officer(state: &AppState, headers: &HeaderMap) -> ServerResult<Identity> {
    let identity = Identity::from_headers(headers)?;
    if !state.roster.is_officer(&identity.email).await? {
        tracing::warn!(email = %identity.email, "officer endpoint refused");
        return Err(ServerError::Forbidden(format!("{} is not a registration officer", identity.email)));
    }
    Ok(identity)
}

/// The order, provided the caller placed it.
async fn own_order(state: &AppState, identity: &Identity, id: &str) -> ServerResult<Order> {
    let order = state.orders.get(id).await?;
    if !identity.buyer().owns(&order.buyer_email) {
        return Err(ServerError::Forbidden(format!("order {id} belongs to another buyer")));
    }
    Ok(order)
}

/// The booking, provided the caller made it.
async fn own_booking(state: &AppState, identity: &Identity, code: &str) -> ServerResult<Booking> {
    let booking = state.bookings.get(code).await?;
    if !identity.buyer().owns(&booking.email) {
        return Err(ServerError::Forbidden(format!("booking {code} belongs to another buyer")));
    }
    Ok(booking)
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler(State(st): Shared) -> Json<serde_json::Value> {
    Json(json!({
        "name": "kemah-server",
        "version": env!("CARGO_PKG_VERSION"),
        "orders_table": st.orders.table(),
        "bookings_table": st.bookings.table(),
        "verifies_gateway_signatures": st.reconciler.verifies_signatures(),
    }))
}

// ---------------------------------------------------------------------------
// Orders (buyer)
// ---------------------------------------------------------------------------

pub async fn create_order(
    State(st): Shared,
    headers: HeaderMap,
    Json(request): Json<NewOrder>,
) -> ServerResult<impl IntoResponse> {
    let identity = Identity::from_headers(&headers)?;
    let order = st.orders.create(request, &identity.buyer()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn my_orders(State(st): Shared, headers: HeaderMap) -> ServerResult<Json<Vec<Order>>> {
    let identity = Identity::from_headers(&headers)?;
    Ok(Json(st.orders.list_for_buyer(&identity.email).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProofBody {
    pub proof: String,
}

pub async fn upload_proof(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ProofBody>,
) -> ServerResult<Json<Transition<Order>>> {
    let identity = Identity::from_headers(&headers)?;
    own_order(&st, &identity, &id).await?;
    Ok(Json(st.orders.upload_proof(&id, &body.proof).await?))
}

pub async fn confirm_receipt(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Transition<Order>>> {
    let identity = Identity::from_headers(&headers)?;
    own_order(&st, &identity, &id).await?;
    Ok(Json(st.orders.confirm_receipt(&id).await?))
}

/// Open a checkout session billing the order's stored total.
pub async fn charge_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<PaymentSession>> {
    let identity = Identity::from_headers(&headers)?;
    own_order(&st, &identity, &id).await?;
    Ok(Json(st.checkout.pay_order(&id, Attempt::First).await?))
}

pub async fn resume_order_payment(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<PaymentSession>> {
    let identity = Identity::from_headers(&headers)?;
    own_order(&st, &identity, &id).await?;
    Ok(Json(st.checkout.pay_order(&id, Attempt::Resume).await?))
}

// ---------------------------------------------------------------------------
// Orders (officer)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list_orders(
    State(st): Shared,
    headers: HeaderMap,
    Query(filter): Query<StatusFilter>,
) -> ServerResult<Json<Vec<Order>>> {
    officer(&st, &headers).await?;
    let mut orders = st.orders.list().await?;
    if let Some(status) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = OrderStatus::parse(status).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        orders.retain(|order| order.status == status);
    }
    Ok(Json(orders))
}

#[derive(Debug, Serialize)]
pub struct StatusTotal {
    pub status: OrderStatus,
    pub total: Rupiah,
}

pub async fn order_totals(State(st): Shared, headers: HeaderMap) -> ServerResult<Json<Vec<StatusTotal>>> {
    officer(&st, &headers).await?;
    let totals = st.orders.totals_by_status().await?;
    Ok(Json(
        totals
            .into_iter()
            .map(|(status, total)| StatusTotal { status, total })
            .collect(),
    ))
}

pub async fn verify_payment(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Transition<Order>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.orders.mark_paid(&id, PaymentSource::Officer).await?))
}

pub async fn notify_seller(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Transition<Order>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.orders.notify_seller(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ShipBody {
    pub tracking: String,
    #[serde(default)]
    pub proof: Option<String>,
}

pub async fn ship_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ShipBody>,
) -> ServerResult<Json<Transition<Order>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.orders.ship(&id, &body.tracking, body.proof.as_deref()).await?))
}

pub async fn settle_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Transition<Order>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.orders.settle(&id).await?))
}

pub async fn cancel_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut request): Json<CancelRequest>,
) -> ServerResult<Json<Transition<Order>>> {
    let identity = officer(&st, &headers).await?;
    request.by = identity.email;
    Ok(Json(st.orders.cancel(&id, &request).await?))
}

pub async fn refund_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut request): Json<RefundRequest>,
) -> ServerResult<Json<Transition<Order>>> {
    let identity = officer(&st, &headers).await?;
    request.by = identity.email;
    Ok(Json(st.orders.refund(&id, &request).await?))
}

pub async fn archive_order(
    State(st): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Transition<Order>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.orders.archive(&id).await?))
}

// ---------------------------------------------------------------------------
// Bookings (buyer)
// ---------------------------------------------------------------------------

pub async fn create_booking(
    State(st): Shared,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> ServerResult<impl IntoResponse> {
    let identity = Identity::from_headers(&headers)?;
    let booking = st.bookings.create(request, &identity.buyer()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn my_bookings(State(st): Shared, headers: HeaderMap) -> ServerResult<Json<Vec<Booking>>> {
    let identity = Identity::from_headers(&headers)?;
    Ok(Json(st.bookings.list_for_buyer(&identity.email).await?))
}

pub async fn charge_booking(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<PaymentSession>> {
    let identity = Identity::from_headers(&headers)?;
    own_booking(&st, &identity, &code).await?;
    Ok(Json(st.checkout.pay_booking(&code, Attempt::First).await?))
}

pub async fn resume_booking_payment(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<PaymentSession>> {
    let identity = Identity::from_headers(&headers)?;
    own_booking(&st, &identity, &code).await?;
    Ok(Json(st.checkout.pay_booking(&code, Attempt::Resume).await?))
}

// ---------------------------------------------------------------------------
// Bookings (officer)
// ---------------------------------------------------------------------------

pub async fn list_bookings(
    State(st): Shared,
    headers: HeaderMap,
    Query(filter): Query<StatusFilter>,
) -> ServerResult<Json<Vec<Booking>>> {
    officer(&st, &headers).await?;
    let mut bookings = st.bookings.list().await?;
    if let Some(status) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = BookingStatus::parse(status).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        bookings.retain(|booking| booking.status == status);
    }
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<Booking>> {
    officer(&st, &headers).await?;
    Ok(Json(st.bookings.get(&code).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct LotBody {
    #[serde(default)]
    pub lot: Option<String>,
}

pub async fn confirm_booking_payment(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
    body: Option<Json<LotBody>>,
) -> ServerResult<Json<Transition<Booking>>> {
    officer(&st, &headers).await?;
    let lot = body.and_then(|Json(body)| body.lot);
    Ok(Json(st.bookings.confirm_payment(&code, lot.as_deref()).await?))
}

pub async fn assign_lot(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
    Json(body): Json<LotBody>,
) -> ServerResult<Json<Booking>> {
    officer(&st, &headers).await?;
    let lot = body
        .lot
        .ok_or_else(|| ServerError::BadRequest("lot is required".into()))?;
    Ok(Json(st.bookings.assign_lot(&code, &lot).await?))
}

pub async fn check_in(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<Transition<Booking>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.bookings.check_in(&code).await?))
}

pub async fn cancel_booking(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<Transition<Booking>>> {
    officer(&st, &headers).await?;
    Ok(Json(st.bookings.cancel(&code).await?))
}

pub async fn regenerate_ticket(
    State(st): Shared,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ServerResult<Json<Booking>> {
    officer(&st, &headers).await?;
    Ok(Json(st.bookings.regenerate_ticket(&code).await?))
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

/// Gateway webhook. Answers 200 for every handled notification, including
/// unknown ids and refused transitions, so the gateway stops retrying.
pub async fn payment_notification(State(st): Shared, body: Bytes) -> ServerResult<Json<Reconciliation>> {
    let notification = GatewayNotification::from_json(&body)?;
    Ok(Json(st.reconciler.handle(&notification).await?))
}
