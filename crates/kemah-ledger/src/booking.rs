use kemah_store::Record;
use kemah_types::{BookingStatus, Rupiah, TicketCode};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::schema::booking as col;

/// An event reservation, parsed from one row of the bookings table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub code: TicketCode,
    pub event_id: String,
    pub event_name: String,
    pub proposed_by: String,
    pub contact_person: String,
    pub phone: String,
    pub email: String,
    pub participants: u32,
    pub special_requests: String,
    pub tent_size: String,
    pub tier: String,
    pub lot: String,
    /// Per-participant price resolved at creation.
    pub price: Rupiah,
    /// Amount due for the whole booking.
    pub amount: Rupiah,
    pub ticket_link: String,
    pub checked_in: bool,
    pub date_submitted: String,
    pub status: BookingStatus,
}

impl Booking {
    pub fn from_record(record: &Record) -> LedgerResult<Self> {
        let raw_code = record.get(col::ID);
        let malformed = |reason: String| LedgerError::Malformed {
            id: raw_code.to_string(),
            reason,
        };
        let code = TicketCode::parse(raw_code).map_err(|e| malformed(e.to_string()))?;
        let status = BookingStatus::parse(record.get(col::STATUS)).map_err(|e| malformed(e.to_string()))?;

        let participants = match record.get(col::PARTICIPANTS) {
            "" => 1,
            text => u32::try_from(Rupiah::parse_lenient(text).amount()).unwrap_or(u32::MAX),
        };
        let price = Rupiah::parse_lenient(record.get(col::PRICE));
        let amount = match Rupiah::parse_lenient(record.get(col::AMOUNT)) {
            amount if amount.is_zero() => price * participants,
            amount => amount,
        };

        Ok(Self {
            code,
            event_id: record.get(col::EVENT_ID).to_string(),
            event_name: record.get(col::EVENT_NAME).to_string(),
            proposed_by: record.get(col::PROPOSED_BY).to_string(),
            contact_person: record.get(col::CONTACT_PERSON).to_string(),
            phone: record.get(col::PHONE).trim_start_matches('\'').to_string(),
            email: record.get(col::EMAIL).to_string(),
            participants,
            special_requests: record.get(col::SPECIAL_REQUESTS).to_string(),
            tent_size: record.get(col::TENT_SIZE).to_string(),
            tier: record.get(col::TIER).to_string(),
            lot: record.get(col::LOT).to_string(),
            price,
            amount,
            ticket_link: record.get(col::TICKET_LINK).to_string(),
            checked_in: record.get(col::CHECK_IN).eq_ignore_ascii_case(col::CHECKED_IN),
            date_submitted: record.get(col::DATE_SUBMITTED).to_string(),
            status,
        })
    }

    /// Returns `true` if a real plot has been assigned.
    pub fn has_lot(&self) -> bool {
        lot_is_assigned(&self.lot)
    }
}

/// A lot value counts as assigned when it is neither blank nor the `TBA`
/// placeholder.
pub fn lot_is_assigned(lot: &str) -> bool {
    let lot = lot.trim();
    !lot.is_empty() && !lot.eq_ignore_ascii_case(col::LOT_PLACEHOLDER)
}

/// A buyer's reservation request.
///
/// `client_price` is accepted for compatibility with older clients and
/// ignored; the stored price is always resolved from the events table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BookingRequest {
    pub event_id: String,
    #[serde(default)]
    pub participants: Option<u32>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub special_requests: String,
    #[serde(default)]
    pub tent_size: String,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub client_price: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_placeholders() {
        assert!(!lot_is_assigned(""));
        assert!(!lot_is_assigned("  "));
        assert!(!lot_is_assigned("TBA"));
        assert!(!lot_is_assigned("tba"));
        assert!(lot_is_assigned("B-12"));
    }

    #[test]
    fn parses_reservation_row() {
        let record = Record::from_pairs([
            ("Reservation ID", "9F3A11C0"),
            ("Event Name", "Kemah Akbar"),
            ("Participant Count", "3"),
            ("Reservation Status", "Confirmed Payment"),
            ("Phone Number", "'08123"),
            ("Jumlah Pembayaran", "Rp 100.000"),
            ("Check In?", "Yes"),
            ("Kavling", "TBA"),
        ]);
        let booking = Booking::from_record(&record).unwrap();
        assert_eq!(booking.status, BookingStatus::ConfirmedPayment);
        assert_eq!(booking.phone, "08123");
        assert_eq!(booking.price, Rupiah(100_000));
        assert_eq!(booking.amount, Rupiah(300_000));
        assert!(booking.checked_in);
        assert!(!booking.has_lot());
    }

    #[test]
    fn rows_without_code_are_malformed() {
        let record = Record::from_pairs([("Reservation ID", ""), ("Reservation Status", "Pending")]);
        assert!(matches!(
            Booking::from_record(&record),
            Err(LedgerError::Malformed { .. })
        ));
    }
}
