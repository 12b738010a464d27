//! Server-side booking prices.
//!
//! The events table carries one price per membership tier. The price a
//! booking is stored with is always resolved here from the buyer's verified
//! tier; whatever price the client displayed is never trusted.

use kemah_store::Record;
use kemah_types::{MembershipTier, Rupiah};
use serde::Serialize;

use crate::schema::event as col;

/// One row of the events table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub price_alumni: Rupiah,
    pub price_new_member: Rupiah,
    pub price_general: Rupiah,
}

impl Event {
    /// Parse an events row. Rows without an id are not bookable and yield
    /// `None`.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record.get_any(col::ID);
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            name: record.get_any(col::NAME).to_string(),
            price_alumni: Rupiah::parse_lenient(record.get_any(col::PRICE_ALUMNI)),
            price_new_member: Rupiah::parse_lenient(record.get_any(col::PRICE_NEW_MEMBER)),
            price_general: Rupiah::parse_lenient(record.get_any(col::PRICE_GENERAL)),
        })
    }

    /// Per-participant price for a buyer of `tier`.
    ///
    /// General members pay the general price when one is set and the
    /// new-member price otherwise.
    pub fn price_for(&self, tier: MembershipTier) -> Rupiah {
        match tier {
            MembershipTier::Alumni => self.price_alumni,
            MembershipTier::General if !self.price_general.is_zero() => self.price_general,
            MembershipTier::General | MembershipTier::NewMember => self.price_new_member,
        }
    }
}

/// Find an event by id (trimmed, exact).
pub fn find_event(records: &[Record], event_id: &str) -> Option<Event> {
    let wanted = event_id.trim();
    records
        .iter()
        .filter_map(Event::from_record)
        .find(|event| event.id == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(general: &str) -> Event {
        Event::from_record(&Record::from_pairs([
            ("ID", "EV-1"),
            ("Activity", "Kemah Akbar"),
            ("price_alumni", "100000"),
            ("price_new_member", "Rp 150.000"),
            ("price_general", general),
        ]))
        .unwrap()
    }

    #[test]
    fn tier_prices() {
        let ev = event("175000");
        assert_eq!(ev.price_for(MembershipTier::Alumni), Rupiah(100_000));
        assert_eq!(ev.price_for(MembershipTier::NewMember), Rupiah(150_000));
        assert_eq!(ev.price_for(MembershipTier::General), Rupiah(175_000));
    }

    #[test]
    fn general_falls_back_to_new_member() {
        let ev = event("");
        assert_eq!(ev.price_for(MembershipTier::General), Rupiah(150_000));
    }

    #[test]
    fn header_aliases() {
        let ev = Event::from_record(&Record::from_pairs([
            ("event_id", "EV-2"),
            ("Title", "Jambore"),
            ("Price", "50.000"),
        ]))
        .unwrap();
        assert_eq!(ev.name, "Jambore");
        assert_eq!(ev.price_new_member, Rupiah(50_000));
        assert!(Event::from_record(&Record::from_pairs([("Title", "No id")])).is_none());
    }

    #[test]
    fn find_by_trimmed_id() {
        let records = vec![
            Record::from_pairs([("id", "EV-1"), ("name", "A")]),
            Record::from_pairs([("id", "EV-2"), ("name", "B")]),
        ];
        assert_eq!(find_event(&records, " EV-2 ").unwrap().name, "B");
        assert!(find_event(&records, "EV-3").is_none());
    }
}
