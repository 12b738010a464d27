//! Lifecycle state machines for orders and bookings.
//!
//! The transition graphs live here, next to the status enums, so that the
//! ledgers can never write a status that is not reachable along an edge.
//! Parsing accepts the legacy spellings found in older sheet rows; rendering
//! always produces the canonical label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Status of a marketplace order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    VerifyingPayment,
    Paid,
    ReadyToShip,
    OnShipment,
    ItemReceived,
    Settled,
    Cancelled,
    Refunded,
    Archived,
}

/// A requested transition on an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEdge {
    /// Payment confirmed by the gateway or verified by an officer.
    MarkPaid,
    /// Buyer uploaded a manual transfer proof.
    UploadProof,
    NotifySeller,
    Ship,
    ConfirmReceipt,
    Settle,
    Cancel,
    Refund,
    Archive,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        Self::PendingPayment,
        Self::VerifyingPayment,
        Self::Paid,
        Self::ReadyToShip,
        Self::OnShipment,
        Self::ItemReceived,
        Self::Settled,
        Self::Cancelled,
        Self::Refunded,
        Self::Archived,
    ];

    /// Canonical label stored in the sheet.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Pending Payment",
            Self::VerifyingPayment => "Verifying Payment",
            Self::Paid => "Paid",
            Self::ReadyToShip => "Ready to Ship",
            Self::OnShipment => "On Shipment",
            Self::ItemReceived => "Item Received",
            Self::Settled => "Settled",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
            Self::Archived => "Archived",
        }
    }

    /// Parse a status cell.
    ///
    /// Comparison is case-insensitive. `Pending` (the label older rows were
    /// created with) reads as `Pending Payment`, and any `Cancelled (...)`
    /// variant reads as `Cancelled`.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let norm = text.trim().to_ascii_lowercase();
        if let Some(status) = Self::ALL
            .iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(&norm))
        {
            return Ok(*status);
        }
        match norm.as_str() {
            "pending" => Ok(Self::PendingPayment),
            "shipped" => Ok(Self::OnShipment),
            "completed" => Ok(Self::ItemReceived),
            s if s.starts_with("cancelled") || s.starts_with("canceled") => Ok(Self::Cancelled),
            _ => Err(TypeError::UnknownOrderStatus(text.to_string())),
        }
    }

    /// The status reached by following `edge`, or `None` when this status has
    /// no such outgoing edge.
    pub fn transition(self, edge: OrderEdge) -> Option<OrderStatus> {
        use OrderEdge as E;
        use OrderStatus as S;
        match (self, edge) {
            (S::PendingPayment | S::VerifyingPayment, E::MarkPaid) => Some(S::Paid),
            (S::PendingPayment, E::UploadProof) => Some(S::VerifyingPayment),
            (S::Paid, E::NotifySeller) => Some(S::ReadyToShip),
            (S::ReadyToShip, E::Ship) => Some(S::OnShipment),
            (S::OnShipment, E::ConfirmReceipt) => Some(S::ItemReceived),
            (S::ItemReceived, E::Settle) => Some(S::Settled),
            (S::PendingPayment | S::VerifyingPayment | S::Paid | S::ReadyToShip, E::Cancel) => {
                Some(S::Cancelled)
            }
            (S::Cancelled, E::Refund) => Some(S::Refunded),
            (S::Settled | S::Refunded, E::Archive) => Some(S::Archived),
            _ => None,
        }
    }

    /// Returns `true` if no edge leaves this status.
    pub fn is_terminal(&self) -> bool {
        OrderEdge::ALL
            .iter()
            .all(|edge| self.transition(*edge).is_none())
    }
}

impl OrderEdge {
    pub const ALL: [OrderEdge; 9] = [
        Self::MarkPaid,
        Self::UploadProof,
        Self::NotifySeller,
        Self::Ship,
        Self::ConfirmReceipt,
        Self::Settle,
        Self::Cancel,
        Self::Refund,
        Self::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkPaid => "mark_paid",
            Self::UploadProof => "upload_proof",
            Self::NotifySeller => "notify_seller",
            Self::Ship => "ship",
            Self::ConfirmReceipt => "confirm_receipt",
            Self::Settle => "settle",
            Self::Cancel => "cancel",
            Self::Refund => "refund",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bookings
// ---------------------------------------------------------------------------

/// Status of an event booking.
///
/// Check-in is tracked by a separate flag on the booking, not by this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    ConfirmedPayment,
    Cancelled,
}

/// A requested transition on a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEdge {
    ConfirmPayment,
    Cancel,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        Self::PendingPayment,
        Self::ConfirmedPayment,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Pending Payment",
            Self::ConfirmedPayment => "Confirmed Payment",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let norm = text.trim().to_ascii_lowercase();
        match norm.as_str() {
            "pending payment" | "pending" => Ok(Self::PendingPayment),
            "confirmed payment" | "confirmed" | "paid" => Ok(Self::ConfirmedPayment),
            s if s.starts_with("cancelled") || s.starts_with("canceled") => Ok(Self::Cancelled),
            _ => Err(TypeError::UnknownBookingStatus(text.to_string())),
        }
    }

    pub fn transition(self, edge: BookingEdge) -> Option<BookingStatus> {
        match (self, edge) {
            (Self::PendingPayment, BookingEdge::ConfirmPayment) => Some(Self::ConfirmedPayment),
            (Self::PendingPayment | Self::ConfirmedPayment, BookingEdge::Cancel) => {
                Some(Self::Cancelled)
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl BookingEdge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm_payment",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BookingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
