use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Kemah endpoints.
///
/// Middleware is attached by [`KemahServer`](crate::KemahServer) so tests can
/// drive the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        // orders
        .route("/v1/orders", post(handler::create_order))
        .route("/v1/orders/mine", get(handler::my_orders))
        .route("/v1/orders/:id/proof", post(handler::upload_proof))
        .route("/v1/orders/:id/receipt", post(handler::confirm_receipt))
        .route("/v1/orders/:id/charge", post(handler::charge_order))
        .route("/v1/orders/:id/resume-payment", post(handler::resume_order_payment))
        .route("/v1/officer/orders", get(handler::list_orders))
        .route("/v1/officer/orders/totals", get(handler::order_totals))
        .route("/v1/officer/orders/:id/verify", post(handler::verify_payment))
        .route("/v1/officer/orders/:id/notify-seller", post(handler::notify_seller))
        .route("/v1/officer/orders/:id/ship", post(handler::ship_order))
        .route("/v1/officer/orders/:id/settle", post(handler::settle_order))
        .route("/v1/officer/orders/:id/cancel", post(handler::cancel_order))
        .route("/v1/officer/orders/:id/refund", post(handler::refund_order))
        .route("/v1/officer/orders/:id/archive", post(handler::archive_order))
        // bookings
        .route("/v1/bookings", post(handler::create_booking))
        .route("/v1/bookings/mine", get(handler::my_bookings))
        .route("/v1/bookings/:code/charge", post(handler::charge_booking))
        .route("/v1/bookings/:code/resume-payment", post(handler::resume_booking_payment))
        .route("/v1/officer/bookings", get(handler::list_bookings))
        .route("/v1/officer/bookings/:code", get(handler::get_booking))
        .route(
            "/v1/officer/bookings/:code/confirm-payment",
            post(handler::confirm_booking_payment),
        )
        .route("/v1/officer/bookings/:code/assign-lot", post(handler::assign_lot))
        .route("/v1/officer/bookings/:code/check-in", post(handler::check_in))
        .route("/v1/officer/bookings/:code/cancel", post(handler::cancel_booking))
        .route(
            "/v1/officer/bookings/:code/regenerate-ticket",
            post(handler::regenerate_ticket),
        )
        // payment gateway
        .route("/v1/payments/notification", post(handler::payment_notification))
        .with_state(state)
}
