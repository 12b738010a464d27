use std::fmt;

use kemah_store::Record;
use kemah_types::{OrderId, OrderStatus, Rupiah};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::schema::order as col;

/// A marketplace order, parsed from one row of the orders table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub item_name: String,
    pub unit_price: Rupiah,
    pub quantity: u32,
    pub total_price: Rupiah,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub supplier_name: String,
    pub supplier_phone: String,
    pub supplier_email: String,
    pub status: OrderStatus,
    pub date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payment_proof: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resi: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shipment_proof: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<Cancellation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<Refund>,
    /// Paid, but the catalog has not yet confirmed the stock decrement.
    #[serde(skip)]
    pub stock_pending: bool,
}

/// Cancellation metadata recorded alongside a `Cancelled` status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    pub reason: String,
    pub notes: String,
    pub by: String,
    pub date: String,
}

/// Refund metadata recorded alongside a `Refunded` status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Refund {
    pub amount: Rupiah,
    pub method: String,
    pub date: String,
    pub proof: String,
    pub notes: String,
    pub by: String,
}

impl Order {
    /// Parse a decoded row. Quantity defaults to 1 when the cell is blank,
    /// as it is on rows typed in by hand.
    pub fn from_record(record: &Record) -> LedgerResult<Self> {
        let raw_id = record.get(col::ID);
        let malformed = |reason: String| LedgerError::Malformed {
            id: raw_id.to_string(),
            reason,
        };
        let id = OrderId::parse(raw_id).map_err(|e| malformed(e.to_string()))?;
        let status = OrderStatus::parse(record.get(col::STATUS)).map_err(|e| malformed(e.to_string()))?;

        let quantity = match record.get(col::QUANTITY) {
            "" => 1,
            text => u32::try_from(Rupiah::parse_lenient(text).amount()).unwrap_or(u32::MAX),
        };
        let unit_price = Rupiah::parse_lenient(record.get(col::UNIT_PRICE));
        let total_price = match Rupiah::parse_lenient(record.get(col::TOTAL_PRICE)) {
            total if total.is_zero() => unit_price * quantity,
            total => total,
        };

        let cancellation = (!record.get(col::CANCELLATION_REASON).is_empty()).then(|| Cancellation {
            reason: record.get(col::CANCELLATION_REASON).to_string(),
            notes: record.get(col::CANCELLATION_NOTES).to_string(),
            by: record.get(col::CANCELLED_BY).to_string(),
            date: record.get(col::CANCELLED_DATE).to_string(),
        });
        let refund = (!record.get(col::REFUND_AMOUNT).is_empty()).then(|| Refund {
            amount: Rupiah::parse_lenient(record.get(col::REFUND_AMOUNT)),
            method: record.get(col::REFUND_METHOD).to_string(),
            date: record.get(col::REFUND_DATE).to_string(),
            proof: record.get(col::REFUND_PROOF).to_string(),
            notes: record.get(col::REFUND_NOTES).to_string(),
            by: record.get(col::REFUNDED_BY).to_string(),
        });

        Ok(Self {
            id,
            item_name: record.get(col::ITEM_NAME).to_string(),
            unit_price,
            quantity,
            total_price,
            buyer_name: record.get(col::USER_NAME).to_string(),
            buyer_email: record.get(col::USER_EMAIL).to_string(),
            buyer_phone: record.get(col::PHONE).to_string(),
            supplier_name: record.get(col::SUPPLIER_NAME).to_string(),
            supplier_phone: record.get(col::SUPPLIER_PHONE).to_string(),
            supplier_email: record.get(col::SUPPLIER_EMAIL).to_string(),
            status,
            date: record.get(col::DATE).to_string(),
            payment_proof: record.get(col::PAYMENT_PROOF).to_string(),
            resi: record.get(col::RESI).to_string(),
            shipment_proof: record.get(col::SHIPMENT_PROOF).to_string(),
            cancellation,
            refund,
            stock_pending: record
                .get(col::STOCK_DECREMENTED)
                .eq_ignore_ascii_case(col::STOCK_PENDING),
        })
    }
}

/// A buyer's purchase request. Price and supplier come from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewOrder {
    pub item_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub phone: String,
}

/// Who confirmed a payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Gateway,
    Officer,
}

impl PaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Officer => "officer",
        }
    }
}

impl fmt::Display for PaymentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an order was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    SellerIssue,
    BuyerRequest,
    AdminAction,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SellerIssue => "seller_issue",
            Self::BuyerRequest => "buyer_request",
            Self::AdminAction => "admin_action",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CancelRequest {
    pub reason: CancelReason,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub by: String,
}

/// Refund instruction from an officer.
///
/// `amount` defaults to the order total, but only when the officer has set
/// `confirmed`; an unconfirmed refund is refused.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub amount: Option<Rupiah>,
    #[serde(default)]
    pub confirmed: bool,
    pub method: String,
    #[serde(default)]
    pub proof: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub by: String,
}
