//! Boundaries to the systems the ledgers drive but do not own.
//!
//! Each collaborator is a trait so the ledgers can be exercised against
//! in-process fakes. Only the catalog participates in an invariant (stock is
//! decremented once per paid order); notifications and ticket rendering are
//! best-effort and never roll back a status change. The payment gateway only
//! opens checkout sessions; it learns nothing back except through the
//! notification webhook.

use std::time::Duration;

use async_trait::async_trait;
use kemah_types::Rupiah;
use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::error::{LedgerError, LedgerResult};
use crate::order::Order;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A sellable product as the catalog describes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub unit_price: Rupiah,
    pub stock: u64,
    #[serde(default)]
    pub discontinued: bool,
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub supplier_phone: String,
    #[serde(default)]
    pub supplier_email: String,
}

/// Product and stock source.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product by name (case-insensitive, trimmed).
    async fn find_product(&self, name: &str) -> LedgerResult<Option<Product>>;

    /// Reduce stock by `quantity`, clamped at zero. Returns the new stock.
    async fn decrement_stock(&self, name: &str, quantity: u32) -> LedgerResult<u64>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Something a human should hear about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    OrderCreated { order: Order },
    SellerNotified { order: Order },
    OrderCancelled { order: Order },
    OrderRefunded { order: Order },
    BookingConfirmed { booking: Booking },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::SellerNotified { .. } => "seller_notified",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::OrderRefunded { .. } => "order_refunded",
            Self::BookingConfirmed { .. } => "booking_confirmed",
        }
    }

    /// Id of the record the notification is about.
    pub fn subject(&self) -> &str {
        match self {
            Self::OrderCreated { order }
            | Self::SellerNotified { order }
            | Self::OrderCancelled { order }
            | Self::OrderRefunded { order } => order.id.as_str(),
            Self::BookingConfirmed { booking } => booking.code.as_str(),
        }
    }
}

/// Delivery channel for [`Notification`]s (email, chat link).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> LedgerResult<()>;
}

/// Notifier that emits one structured `tracing` event per notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> LedgerResult<()> {
        match notification {
            Notification::OrderCreated { order } | Notification::SellerNotified { order } => {
                tracing::info!(
                    kind = notification.kind(),
                    order_id = %order.id,
                    item = %order.item_name,
                    quantity = order.quantity,
                    supplier = %order.supplier_email,
                    "notification"
                );
            }
            Notification::OrderCancelled { order } | Notification::OrderRefunded { order } => {
                tracing::info!(
                    kind = notification.kind(),
                    order_id = %order.id,
                    buyer = %order.buyer_email,
                    "notification"
                );
            }
            Notification::BookingConfirmed { booking } => {
                tracing::info!(
                    kind = notification.kind(),
                    ticket_code = %booking.code,
                    email = %booking.email,
                    event = %booking.event_name,
                    "notification"
                );
            }
        }
        Ok(())
    }
}

/// Send `notification`, logging instead of failing.
pub(crate) async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(err) = notifier.notify(&notification).await {
        tracing::warn!(
            kind = notification.kind(),
            subject = notification.subject(),
            error = %err,
            "notification failed"
        );
    }
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// Fields printed on a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketRequest {
    pub ticket_code: String,
    pub event_name: String,
    pub participant: String,
    pub email: String,
    pub participants: u32,
    pub lot: String,
    pub tier: String,
    pub amount: Rupiah,
}

impl From<&Booking> for TicketRequest {
    fn from(booking: &Booking) -> Self {
        Self {
            ticket_code: booking.code.to_string(),
            event_name: booking.event_name.clone(),
            participant: booking.proposed_by.clone(),
            email: booking.email.clone(),
            participants: booking.participants,
            lot: booking.lot.clone(),
            tier: booking.tier.clone(),
            amount: booking.amount,
        }
    }
}

/// Produces a ticket document and returns a link to it.
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    async fn render(&self, request: &TicketRequest) -> LedgerResult<String>;
}

/// Renderer for deployments without a ticket service. Always fails, which
/// the confirm-payment edge tolerates.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledTicketRenderer;

#[async_trait]
impl TicketRenderer for DisabledTicketRenderer {
    async fn render(&self, _request: &TicketRequest) -> LedgerResult<String> {
        Err(LedgerError::collaborator("ticket renderer", "not configured"))
    }
}

#[derive(Deserialize)]
struct RenderResponse {
    url: String,
}

/// Renderer that POSTs the ticket fields as JSON and expects `{ "url": … }`.
#[derive(Clone, Debug)]
pub struct HttpTicketRenderer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTicketRenderer {
    pub fn new(endpoint: impl Into<String>) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::Configuration(format!("ticket renderer client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TicketRenderer for HttpTicketRenderer {
    async fn render(&self, request: &TicketRequest) -> LedgerResult<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| LedgerError::collaborator("ticket renderer", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::collaborator(
                "ticket renderer",
                format!("http {}", status.as_u16()),
            ));
        }
        let body: RenderResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::collaborator("ticket renderer", e))?;
        if body.url.trim().is_empty() {
            return Err(LedgerError::collaborator("ticket renderer", "empty url"));
        }
        Ok(body.url)
    }
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

/// Payment channels offered at checkout: QRIS, e-wallets and bank virtual
/// accounts. Card payments are not offered.
pub const ENABLED_PAYMENTS: [&str; 8] = [
    "other_qris",
    "bank_transfer",
    "bca_va",
    "bni_va",
    "bri_va",
    "permata_va",
    "echannel",
    "cimb_va",
];

/// Payer shown on the gateway's checkout page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
}

/// One billed line. The gateway requires `price * quantity` over all lines
/// to equal the gross amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChargeItem {
    pub id: String,
    pub name: String,
    pub price: Rupiah,
    pub quantity: u32,
}

/// A request to open a checkout session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Id the gateway will echo back in its notifications.
    pub order_id: String,
    pub gross_amount: Rupiah,
    pub customer: Customer,
    pub items: Vec<ChargeItem>,
}

/// Checkout session handed to the buyer's browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

/// Opens checkout sessions at the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(&self, request: &ChargeRequest) -> LedgerResult<PaymentSession>;
}

/// Gateway for deployments without online payment; buyers upload transfer
/// proofs instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn create_transaction(&self, _request: &ChargeRequest) -> LedgerResult<PaymentSession> {
        Err(LedgerError::collaborator("payment gateway", "not configured"))
    }
}

/// Midtrans Snap client. Authenticates with the server key as the basic-auth
/// user and an empty password.
#[derive(Clone)]
pub struct SnapPaymentGateway {
    http: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl SnapPaymentGateway {
    pub const SANDBOX_BASE: &'static str = "https://app.sandbox.midtrans.com";
    pub const PRODUCTION_BASE: &'static str = "https://app.midtrans.com";

    pub fn new(api_base: &str, server_key: impl Into<String>) -> LedgerResult<Self> {
        let server_key = server_key.into();
        if server_key.trim().is_empty() {
            return Err(LedgerError::Configuration("payment gateway server key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::Configuration(format!("payment gateway client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/snap/v1/transactions", api_base.trim_end_matches('/')),
            server_key,
        })
    }
}

#[async_trait]
impl PaymentGateway for SnapPaymentGateway {
    async fn create_transaction(&self, request: &ChargeRequest) -> LedgerResult<PaymentSession> {
        let body = serde_json::json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": request.gross_amount,
            },
            "enabled_payments": ENABLED_PAYMENTS,
            "customer_details": request.customer,
            "item_details": request.items,
        });
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::collaborator("payment gateway", e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(order_id = %request.order_id, status = status.as_u16(), %detail, "snap transaction refused");
            return Err(LedgerError::collaborator(
                "payment gateway",
                format!("http {}", status.as_u16()),
            ));
        }
        let session: PaymentSession = response
            .json()
            .await
            .map_err(|e| LedgerError::collaborator("payment gateway", e))?;
        tracing::info!(order_id = %request.order_id, gross_amount = %request.gross_amount, "checkout session opened");
        Ok(session)
    }
}

impl std::fmt::Debug for SnapPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapPaymentGateway")
            .field("endpoint", &self.endpoint)
            .field("server_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> TicketRequest {
        TicketRequest {
            ticket_code: "9F3A11C0".into(),
            event_name: "Kemah Akbar".into(),
            participant: "Siti".into(),
            email: "siti@example.com".into(),
            participants: 2,
            lot: "B-3".into(),
            tier: "Alumni".into(),
            amount: Rupiah(200_000),
        }
    }

    #[tokio::test]
    async fn http_renderer_returns_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/render")
                    .json_body_partial(r#"{ "ticket_code": "9F3A11C0", "lot": "B-3" }"#);
                then.status(200).json_body(json!({ "url": "https://tickets/9F3A11C0.pdf" }));
            })
            .await;
        let renderer = HttpTicketRenderer::new(server.url("/render")).unwrap();
        let url = renderer.render(&request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(url, "https://tickets/9F3A11C0.pdf");
    }

    #[tokio::test]
    async fn http_renderer_surfaces_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/render");
                then.status(502);
            })
            .await;
        let renderer = HttpTicketRenderer::new(server.url("/render")).unwrap();
        let err = renderer.render(&request()).await.unwrap_err();
        assert_eq!(err.kind(), "collaborator");
    }

    #[tokio::test]
    async fn disabled_renderer_fails() {
        assert!(DisabledTicketRenderer.render(&request()).await.is_err());
    }

    // --- payment gateway ---

    fn charge() -> ChargeRequest {
        ChargeRequest {
            order_id: "AB12CD34-R0042".into(),
            gross_amount: Rupiah(300_000),
            customer: Customer {
                first_name: "Siti".into(),
                email: "siti@example.com".into(),
                phone: String::new(),
            },
            items: vec![ChargeItem {
                id: "Tenda Dome".into(),
                name: "Tenda Dome".into(),
                price: Rupiah(150_000),
                quantity: 2,
            }],
        }
    }

    #[tokio::test]
    async fn snap_gateway_opens_session() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/snap/v1/transactions")
                    .header_exists("authorization")
                    .json_body_partial(
                        r#"{ "transaction_details": { "order_id": "AB12CD34-R0042", "gross_amount": 300000 } }"#,
                    );
                then.status(201).json_body(json!({
                    "token": "snap-token",
                    "redirect_url": "https://app.sandbox.midtrans.com/snap/v4/redirection/snap-token"
                }));
            })
            .await;
        let gateway = SnapPaymentGateway::new(&server.base_url(), "SB-Mid-server-test").unwrap();
        let session = gateway.create_transaction(&charge()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(session.token, "snap-token");
        assert!(session.redirect_url.ends_with("/snap-token"));
    }

    #[tokio::test]
    async fn snap_gateway_surfaces_refusals() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/snap/v1/transactions");
                then.status(400)
                    .json_body(json!({ "error_messages": ["transaction_details.order_id has already been taken"] }));
            })
            .await;
        let gateway = SnapPaymentGateway::new(&server.base_url(), "SB-Mid-server-test").unwrap();
        let err = gateway.create_transaction(&charge()).await.unwrap_err();
        assert_eq!(err.kind(), "collaborator");
    }

    #[test]
    fn snap_gateway_needs_a_key_and_hides_it() {
        assert!(SnapPaymentGateway::new(SnapPaymentGateway::SANDBOX_BASE, " ").is_err());
        let gateway = SnapPaymentGateway::new(SnapPaymentGateway::SANDBOX_BASE, "SB-Mid-server-secret").unwrap();
        assert!(!format!("{gateway:?}").contains("secret"));
    }

    #[tokio::test]
    async fn disabled_gateway_fails() {
        assert!(DisabledPaymentGateway.create_transaction(&charge()).await.is_err());
    }
}
