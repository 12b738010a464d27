//! Sheet layouts.
//!
//! Header labels are the ones the organization's spreadsheet has always used,
//! Indonesian names included. Code addresses columns by these labels only;
//! positions are resolved from the live header row on every call.

use serde::{Deserialize, Serialize};

/// Names of the tables (sheet tabs) the ledgers use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub orders: String,
    pub bookings: String,
    pub events: String,
    pub catalog: String,
    pub officers: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            orders: "Market OB".into(),
            bookings: "Event Reservation".into(),
            events: "Events".into(),
            catalog: "Market Place".into(),
            officers: "Registration Officer".into(),
        }
    }
}

pub mod order {
    pub const ID: &str = "Order ID";
    pub const ITEM_NAME: &str = "Item Name";
    pub const UNIT_PRICE: &str = "Unit Price";
    pub const QUANTITY: &str = "Quantity";
    pub const TOTAL_PRICE: &str = "Total Price";
    pub const USER_NAME: &str = "User Name";
    pub const USER_EMAIL: &str = "User Email";
    pub const PHONE: &str = "Phone";
    pub const SUPPLIER_NAME: &str = "Supplier Name";
    pub const SUPPLIER_PHONE: &str = "Supplier Phone";
    pub const SUPPLIER_EMAIL: &str = "Supplier Email";
    pub const STATUS: &str = "Status";
    pub const DATE: &str = "Date";

    // Added by officers over time; created on first write.
    pub const PAYMENT_PROOF: &str = "Payment Proof";
    pub const RESI: &str = "Resi";
    pub const SHIPMENT_PROOF: &str = "Shipment Proof";
    pub const CANCELLATION_REASON: &str = "Cancellation Reason";
    pub const CANCELLATION_NOTES: &str = "Cancellation Notes";
    pub const CANCELLED_BY: &str = "Cancelled By";
    pub const CANCELLED_DATE: &str = "Cancelled Date";
    pub const REFUND_AMOUNT: &str = "Refund Amount";
    pub const REFUND_METHOD: &str = "Refund Method";
    pub const REFUND_DATE: &str = "Refund Date";
    pub const REFUND_PROOF: &str = "Refund Proof";
    pub const REFUND_NOTES: &str = "Refund Notes";
    pub const REFUNDED_BY: &str = "Refunded By";
    pub const STOCK_DECREMENTED: &str = "Stock Decremented";

    /// Marker values of `Stock Decremented`. Rows paid before the column
    /// existed are blank and never retried.
    pub const STOCK_PENDING: &str = "No";
    pub const STOCK_DONE: &str = "Yes";

    /// Header row written when the orders table is provisioned.
    pub const HEADERS: [&str; 13] = [
        ID,
        ITEM_NAME,
        UNIT_PRICE,
        QUANTITY,
        TOTAL_PRICE,
        USER_NAME,
        USER_EMAIL,
        PHONE,
        SUPPLIER_NAME,
        SUPPLIER_PHONE,
        SUPPLIER_EMAIL,
        STATUS,
        DATE,
    ];
}

pub mod booking {
    pub const ID: &str = "Reservation ID";
    pub const EVENT_NAME: &str = "Event Name";
    pub const EVENT_ID: &str = "Event ID";
    pub const PROPOSED_BY: &str = "Proposed By";
    pub const PARTICIPANTS: &str = "Participant Count";
    pub const SPECIAL_REQUESTS: &str = "Special Requests";
    pub const STATUS: &str = "Reservation Status";
    pub const CONTACT_PERSON: &str = "Contact Person";
    pub const PHONE: &str = "Phone Number";
    pub const EMAIL: &str = "Email Address";
    pub const DATE_SUBMITTED: &str = "Date Submitted";
    pub const TICKET_LINK: &str = "Link Tiket";
    pub const TICKET_DOWNLOAD: &str = "Link Tiket download";
    pub const REGISTRATION_CHECK: &str = "Registration Check";
    pub const CHECK_IN: &str = "Check In?";
    pub const LOT: &str = "Kavling";
    pub const TIER: &str = "Jenis Anggota";
    pub const PAYMENT_METHOD: &str = "Pilihan Pembayaran";
    pub const TENT_SIZE: &str = "Ukuran Tenda";
    pub const PRICE: &str = "Jumlah Pembayaran";
    pub const GROUP: &str = "Group";
    pub const AGES: &str = "Usia peserta";
    pub const FILTERED: &str = "filtered";
    pub const GAMES_CHECK: &str = "Games check";
    pub const LEGACY_ID: &str = "ID";
    pub const NOTIFICATION_STATUS: &str = "Notification Status";
    pub const AMOUNT: &str = "Amount";

    /// Value of the check-in flag once a participant has arrived.
    pub const CHECKED_IN: &str = "Yes";

    /// Lot placeholder officers type before plots are allocated.
    pub const LOT_PLACEHOLDER: &str = "TBA";

    pub const HEADERS: [&str; 27] = [
        ID,
        EVENT_NAME,
        EVENT_ID,
        PROPOSED_BY,
        PARTICIPANTS,
        SPECIAL_REQUESTS,
        STATUS,
        CONTACT_PERSON,
        PHONE,
        EMAIL,
        DATE_SUBMITTED,
        TICKET_LINK,
        TICKET_DOWNLOAD,
        REGISTRATION_CHECK,
        CHECK_IN,
        LOT,
        TIER,
        PAYMENT_METHOD,
        TENT_SIZE,
        PRICE,
        GROUP,
        AGES,
        FILTERED,
        GAMES_CHECK,
        LEGACY_ID,
        NOTIFICATION_STATUS,
        AMOUNT,
    ];
}

/// Field aliases of the events table, which is maintained by hand.
pub mod event {
    pub const ID: &[&str] = &["id", "event_id"];
    pub const NAME: &[&str] = &["activity", "title", "event_name", "name"];
    pub const PRICE_ALUMNI: &[&str] = &["price_alumni"];
    pub const PRICE_NEW_MEMBER: &[&str] = &["price_new_member", "price"];
    pub const PRICE_GENERAL: &[&str] = &["price_general"];
}

/// Field aliases of the marketplace catalog table.
pub mod catalog {
    pub const NAME: &[&str] = &["product name", "item name", "name", "nama barang"];
    pub const PRICE: &[&str] = &["price (idr)", "price", "harga"];
    pub const DISCONTINUED: &[&str] = &["discontinued"];
    pub const SUPPLIER_NAME: &[&str] = &["contact person", "supplier name"];
    pub const SUPPLIER_PHONE: &[&str] = &["phone number", "supplier phone"];
    pub const SUPPLIER_EMAIL: &[&str] = &["supplier email"];
}

pub mod officer {
    pub const EMAIL: &[&str] = &["email", "email address"];
    pub const NAME: &[&str] = &["name", "full name"];
}
