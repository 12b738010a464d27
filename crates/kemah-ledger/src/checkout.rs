//! Online payment for orders and bookings.
//!
//! The amount billed is always the one stored on the row; the buyer never
//! supplies it. The first session for a record uses the record id as the
//! gateway order id. The gateway refuses to reuse an order id, so a buyer
//! resuming an abandoned checkout gets a retry id of the form
//! `<id>-R<4 digits>`, which the reconciler strips again when the payment
//! notification arrives.

use std::sync::Arc;

use kemah_types::{BookingEdge, OrderEdge, Rupiah};

use crate::booking::Booking;
use crate::bookings::BookingLedger;
use crate::collaborators::{ChargeItem, ChargeRequest, Customer, PaymentGateway, PaymentSession};
use crate::error::{LedgerError, LedgerResult};
use crate::order::Order;
use crate::orders::OrderLedger;

const ITEM_ID_LEN: usize = 40;
const ITEM_NAME_LEN: usize = 45;

/// Whether a checkout is the first for its record or a resumed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    First,
    Resume,
}

/// Gateway order id for a resumed checkout: the record id, `-R`, and the
/// last four digits of the current unix time.
pub fn retry_id(id: &str, unix_secs: i64) -> String {
    format!("{id}-R{:04}", unix_secs.rem_euclid(10_000))
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Opens gateway checkout sessions for payable orders and bookings.
pub struct Checkout {
    orders: Arc<OrderLedger>,
    bookings: Arc<BookingLedger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl Checkout {
    pub fn new(orders: Arc<OrderLedger>, bookings: Arc<BookingLedger>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            orders,
            bookings,
            gateway,
        }
    }

    /// Open a checkout session for an order that is still awaiting payment.
    pub async fn pay_order(&self, id: &str, attempt: Attempt) -> LedgerResult<PaymentSession> {
        let order = self.orders.get(id).await?;
        if order.status.transition(OrderEdge::MarkPaid).is_none() {
            return Err(LedgerError::InvalidTransition {
                id: order.id.to_string(),
                from: order.status.to_string(),
                edge: "charge".into(),
            });
        }
        let request = order_charge(&order, gateway_id(order.id.as_str(), attempt))?;
        self.gateway.create_transaction(&request).await
    }

    /// Open a checkout session for a booking that is still awaiting payment.
    pub async fn pay_booking(&self, code: &str, attempt: Attempt) -> LedgerResult<PaymentSession> {
        let booking = self.bookings.get(code).await?;
        if booking.status.transition(BookingEdge::ConfirmPayment).is_none() {
            return Err(LedgerError::InvalidTransition {
                id: booking.code.to_string(),
                from: booking.status.to_string(),
                edge: "charge".into(),
            });
        }
        let request = booking_charge(&booking, gateway_id(booking.code.as_str(), attempt))?;
        self.gateway.create_transaction(&request).await
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("orders", &self.orders.table())
            .field("bookings", &self.bookings.table())
            .finish()
    }
}

fn gateway_id(id: &str, attempt: Attempt) -> String {
    match attempt {
        Attempt::First => id.to_string(),
        Attempt::Resume => retry_id(id, chrono::Utc::now().timestamp()),
    }
}

fn require_amount(id: &str, amount: Rupiah) -> LedgerResult<()> {
    if amount.is_zero() {
        return Err(LedgerError::Validation(format!("{id} has nothing to pay")));
    }
    Ok(())
}

/// Bill the stored total. Any difference above the goods is shipping; when
/// the lines cannot add up to the total a single summary line is sent.
fn order_charge(order: &Order, order_id: String) -> LedgerResult<ChargeRequest> {
    require_amount(order.id.as_str(), order.total_price)?;
    let goods = order.unit_price * order.quantity;
    let items = if goods.is_zero() || goods > order.total_price {
        vec![ChargeItem {
            id: order.id.to_string(),
            name: truncate(&order.item_name, ITEM_NAME_LEN),
            price: order.total_price,
            quantity: 1,
        }]
    } else {
        let mut items = vec![ChargeItem {
            id: truncate(&order.item_name, ITEM_ID_LEN),
            name: truncate(&order.item_name, ITEM_NAME_LEN),
            price: order.unit_price,
            quantity: order.quantity,
        }];
        let shipping = order.total_price.amount() - goods.amount();
        if shipping > 0 {
            items.push(ChargeItem {
                id: "SHIPPING".into(),
                name: "Shipping Cost".into(),
                price: Rupiah(shipping),
                quantity: 1,
            });
        }
        items
    };
    Ok(ChargeRequest {
        order_id,
        gross_amount: order.total_price,
        customer: Customer {
            first_name: order.buyer_name.clone(),
            email: order.buyer_email.clone(),
            phone: order.buyer_phone.clone(),
        },
        items,
    })
}

fn booking_charge(booking: &Booking, order_id: String) -> LedgerResult<ChargeRequest> {
    require_amount(booking.code.as_str(), booking.amount)?;
    let name = match booking.event_name.trim() {
        "" => "Event Booking".to_string(),
        name => truncate(name, ITEM_NAME_LEN),
    };
    let item_id = match booking.event_id.trim() {
        "" => "EVENT".to_string(),
        id => truncate(id, ITEM_ID_LEN),
    };
    let participants = booking.participants.max(1);
    let per_head = booking.amount.amount() / u64::from(participants);
    let item = if per_head * u64::from(participants) == booking.amount.amount() {
        ChargeItem {
            id: item_id,
            name,
            price: Rupiah(per_head),
            quantity: participants,
        }
    } else {
        ChargeItem {
            id: item_id,
            name,
            price: booking.amount,
            quantity: 1,
        }
    };
    let first_name = if booking.proposed_by.trim().is_empty() {
        booking.contact_person.clone()
    } else {
        booking.proposed_by.clone()
    };
    Ok(ChargeRequest {
        order_id,
        gross_amount: booking.amount,
        customer: Customer {
            first_name,
            email: booking.email.clone(),
            phone: booking.phone.clone(),
        },
        items: vec![item],
    })
}
