//! Event reservation ledger.
//!
//! Payment status and check-in are tracked separately: `Reservation Status`
//! moves Pending Payment → Confirmed Payment (or to Cancelled), while
//! `Check In?` is a flag that can only be raised on a confirmed booking with a
//! real lot.

use std::sync::Arc;

use kemah_store::{locate, FieldUpdate, Location, RecordStore, SchemaStatus};
use kemah_types::{BookingEdge, BookingStatus, TicketCode};

use crate::booking::{lot_is_assigned, Booking, BookingRequest};
use crate::buyer::{same_email, Buyer};
use crate::collaborators::{notify_best_effort, Notification, Notifier, TicketRenderer, TicketRequest};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::KeyedLocks;
use crate::outcome::Transition;
use crate::pricing::find_event;
use crate::rows::{require_columns, timestamp, unique_code};
use crate::schema::booking as col;

/// State machine, pricing and duplicate guard for event bookings.
pub struct BookingLedger {
    store: Arc<dyn RecordStore>,
    renderer: Arc<dyn TicketRenderer>,
    notifier: Arc<dyn Notifier>,
    table: String,
    events_table: String,
    locks: KeyedLocks,
}

impl BookingLedger {
    pub fn new(
        store: Arc<dyn RecordStore>,
        renderer: Arc<dyn TicketRenderer>,
        notifier: Arc<dyn Notifier>,
        table: impl Into<String>,
        events_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renderer,
            notifier,
            table: table.into(),
            events_table: events_table.into(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Provision the bookings table.
    pub async fn ensure_schema(&self) -> LedgerResult<SchemaStatus> {
        Ok(self.store.ensure_schema(&self.table, &col::HEADERS).await?)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Reserve a place at an event.
    ///
    /// Refused with `DuplicateBooking` while the buyer holds a non-cancelled
    /// booking for the same event. The stored price is resolved from the
    /// events table for the buyer's tier.
    pub async fn create(&self, request: BookingRequest, buyer: &Buyer) -> LedgerResult<Booking> {
        let email = buyer.email.trim();
        if email.is_empty() {
            return Err(LedgerError::Validation("buyer email is required".into()));
        }
        if request.event_id.trim().is_empty() {
            return Err(LedgerError::Validation("event id is required".into()));
        }
        let participants = request.participants.unwrap_or(1);
        if participants == 0 {
            return Err(LedgerError::Validation("participant count must be at least 1".into()));
        }
        let lot = request.lot.as_deref().map(str::trim).unwrap_or("");
        if lot.eq_ignore_ascii_case(col::LOT_PLACEHOLDER) {
            return Err(LedgerError::Validation("lot must be a real plot or left empty".into()));
        }

        let events = self.store.read_all(&self.events_table).await?;
        let event = find_event(&events, &request.event_id).ok_or_else(|| LedgerError::RecordNotFound {
            table: self.events_table.clone(),
            id: request.event_id.trim().to_string(),
        })?;

        let _guard = self
            .locks
            .lock(&format!("{}|{}", email.to_lowercase(), event.name.to_lowercase()))
            .await;

        self.store.ensure_schema(&self.table, &col::HEADERS).await?;
        let grid = self.store.read_table(&self.table).await?;
        require_columns(&grid, &self.table, &[col::ID, col::STATUS, col::EMAIL, col::EVENT_NAME])?;

        let duplicate = grid.records().iter().any(|record| {
            same_email(record.get(col::EMAIL), email)
                && record.get(col::EVENT_NAME).eq_ignore_ascii_case(event.name.trim())
                && !BookingStatus::parse(record.get(col::STATUS)).is_ok_and(|s| s.is_cancelled())
        });
        if duplicate {
            tracing::warn!(email, event = %event.name, "duplicate booking refused");
            return Err(LedgerError::DuplicateBooking {
                email: email.to_string(),
                event: event.name,
            });
        }

        let price = event.price_for(buyer.tier);
        if let Some(client_price) = request.client_price.as_deref() {
            tracing::debug!(client_price, resolved = %price, "ignoring client-supplied price");
        }
        let code = unique_code(&grid, col::ID, TicketCode::generate)?;

        let booking = Booking {
            code,
            event_id: event.id.clone(),
            event_name: event.name.clone(),
            proposed_by: buyer.name.trim().to_string(),
            contact_person: buyer.name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            email: email.to_string(),
            participants,
            special_requests: request.special_requests.trim().to_string(),
            tent_size: request.tent_size.trim().to_string(),
            tier: buyer.tier.label().to_string(),
            lot: lot.to_string(),
            price,
            amount: price * participants,
            ticket_link: String::new(),
            checked_in: false,
            date_submitted: timestamp(),
            status: BookingStatus::PendingPayment,
        };
        // A leading apostrophe keeps the sheet from reading 0812… as a number.
        let phone_cell = if booking.phone.is_empty() {
            String::new()
        } else {
            format!("'{}", booking.phone)
        };
        let row = grid.layout_row(&[
            (col::ID, booking.code.to_string()),
            (col::EVENT_NAME, booking.event_name.clone()),
            (col::EVENT_ID, booking.event_id.clone()),
            (col::PROPOSED_BY, booking.proposed_by.clone()),
            (col::PARTICIPANTS, booking.participants.to_string()),
            (col::SPECIAL_REQUESTS, booking.special_requests.clone()),
            (col::STATUS, booking.status.as_str().to_string()),
            (col::CONTACT_PERSON, booking.contact_person.clone()),
            (col::PHONE, phone_cell),
            (col::EMAIL, booking.email.clone()),
            (col::DATE_SUBMITTED, booking.date_submitted.clone()),
            (col::LOT, booking.lot.clone()),
            (col::TIER, booking.tier.clone()),
            (col::PAYMENT_METHOD, "Transfer".to_string()),
            (col::TENT_SIZE, booking.tent_size.clone()),
            (col::PRICE, booking.price.to_idr()),
            (col::AMOUNT, booking.amount.to_plain()),
        ]);
        self.store.append(&self.table, &row).await?;
        tracing::info!(
            ticket_code = %booking.code,
            event = %booking.event_name,
            tier = %buyer.tier,
            price = %booking.price,
            participants,
            "booking created"
        );
        Ok(booking)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Pending Payment → Confirmed Payment.
    ///
    /// Writes the status first and the lot (when given) second, then renders
    /// the ticket and records its link. Rendering failures are logged and
    /// leave the link empty; `regenerate_ticket` can fill it later.
    ///
    /// On a booking that is already confirmed (typically by the gateway) a
    /// new lot is still written and the ticket re-rendered with it. Without
    /// a new lot the call is a no-op.
    pub async fn confirm_payment(&self, code: &str, lot: Option<&str>) -> LedgerResult<Transition<Booking>> {
        let lot = lot.map(str::trim).filter(|l| !l.is_empty());
        if let Some(lot) = lot {
            if !lot_is_assigned(lot) {
                return Err(LedgerError::Validation("lot must be a real plot".into()));
            }
        }

        let code = TicketCode::parse(code)?;
        let _guard = self.locks.lock(code.as_str()).await;
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        let mut booking = Booking::from_record(location.record())?;

        let from = booking.status;
        let to = match from.transition(BookingEdge::ConfirmPayment) {
            Some(to) => to,
            None if from == BookingStatus::ConfirmedPayment => {
                let new_lot = lot
                    .map(str::trim)
                    .filter(|lot| lot_is_assigned(lot) && *lot != booking.lot.trim());
                let Some(lot) = new_lot else {
                    tracing::debug!(ticket_code = %code, "payment already confirmed");
                    return Ok(Transition::already_applied(booking));
                };
                location
                    .write(self.store.as_ref(), &[FieldUpdate::required(col::LOT, lot)])
                    .await?;
                tracing::info!(ticket_code = %code, lot, previous = %booking.lot, "lot assigned on confirmed booking");
                booking.lot = lot.to_string();
                self.attach_ticket(&mut location, &mut booking).await;
                return Ok(Transition::applied(booking));
            }
            None => return Err(invalid(&code, from.as_str(), BookingEdge::ConfirmPayment.as_str())),
        };

        let mut updates = vec![FieldUpdate::required(col::STATUS, to.as_str())];
        if let Some(lot) = lot {
            updates.push(FieldUpdate::required(col::LOT, lot));
            booking.lot = lot.to_string();
        }
        location.write(self.store.as_ref(), &updates).await?;
        booking.status = to;
        tracing::info!(ticket_code = %code, %from, %to, "booking transition");

        self.attach_ticket(&mut location, &mut booking).await;
        notify_best_effort(
            self.notifier.as_ref(),
            Notification::BookingConfirmed {
                booking: booking.clone(),
            },
        )
        .await;
        Ok(Transition::applied(booking))
    }

    /// Render the ticket and store its link. Runs after the commit point, so
    /// every failure is logged and leaves the link as it was.
    async fn attach_ticket(&self, location: &mut Location, booking: &mut Booking) {
        let link = match self.renderer.render(&TicketRequest::from(&*booking)).await {
            Ok(link) => link,
            Err(err) => {
                tracing::warn!(ticket_code = %booking.code, error = %err, "ticket rendering failed");
                return;
            }
        };
        match location
            .write(self.store.as_ref(), &[FieldUpdate::appendable(col::TICKET_LINK, link.as_str())])
            .await
        {
            Ok(()) => booking.ticket_link = link,
            Err(err) => {
                tracing::warn!(ticket_code = %booking.code, error = %err, "ticket link not recorded")
            }
        }
    }

    /// Assign a camping plot. Status is unchanged.
    pub async fn assign_lot(&self, code: &str, lot: &str) -> LedgerResult<Booking> {
        let lot = lot.trim();
        if !lot_is_assigned(lot) {
            return Err(LedgerError::Validation("lot must be a real plot".into()));
        }
        let code = TicketCode::parse(code)?;
        let _guard = self.locks.lock(code.as_str()).await;
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        let mut booking = Booking::from_record(location.record())?;
        if booking.status.is_cancelled() {
            return Err(invalid(&code, booking.status.as_str(), "assign_lot"));
        }
        location
            .write(self.store.as_ref(), &[FieldUpdate::required(col::LOT, lot)])
            .await?;
        tracing::info!(ticket_code = %code, lot, previous = %booking.lot, "lot assigned");
        booking.lot = lot.to_string();
        Ok(booking)
    }

    /// Mark a confirmed participant as arrived.
    ///
    /// Fails with `LotNotAssigned` while the lot is blank or `TBA`. Checking
    /// in twice is a no-op.
    pub async fn check_in(&self, code: &str) -> LedgerResult<Transition<Booking>> {
        let code = TicketCode::parse(code)?;
        let _guard = self.locks.lock(code.as_str()).await;
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        let mut booking = Booking::from_record(location.record())?;

        if booking.status != BookingStatus::ConfirmedPayment {
            return Err(invalid(&code, booking.status.as_str(), "check_in"));
        }
        if !booking.has_lot() {
            return Err(LedgerError::LotNotAssigned(code.to_string()));
        }
        if booking.checked_in {
            return Ok(Transition::already_applied(booking));
        }
        location
            .write(self.store.as_ref(), &[FieldUpdate::required(col::CHECK_IN, col::CHECKED_IN)])
            .await?;
        booking.checked_in = true;
        tracing::info!(ticket_code = %code, lot = %booking.lot, "checked in");
        Ok(Transition::applied(booking))
    }

    /// Cancel a booking that has not been checked in. Frees the
    /// (email, event) pair for a new booking.
    pub async fn cancel(&self, code: &str) -> LedgerResult<Transition<Booking>> {
        let code = TicketCode::parse(code)?;
        let _guard = self.locks.lock(code.as_str()).await;
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        let mut booking = Booking::from_record(location.record())?;

        let from = booking.status;
        if from.is_cancelled() {
            return Ok(Transition::already_applied(booking));
        }
        if booking.checked_in {
            return Err(invalid(&code, "checked in", BookingEdge::Cancel.as_str()));
        }
        let to = from
            .transition(BookingEdge::Cancel)
            .ok_or_else(|| invalid(&code, from.as_str(), BookingEdge::Cancel.as_str()))?;
        location
            .write(self.store.as_ref(), &[FieldUpdate::required(col::STATUS, to.as_str())])
            .await?;
        booking.status = to;
        tracing::info!(ticket_code = %code, %from, %to, "booking transition");
        Ok(Transition::applied(booking))
    }

    /// Render the ticket again and overwrite its link. Only confirmed
    /// bookings have tickets; renderer failures are returned.
    pub async fn regenerate_ticket(&self, code: &str) -> LedgerResult<Booking> {
        let code = TicketCode::parse(code)?;
        let _guard = self.locks.lock(code.as_str()).await;
        let mut location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        let mut booking = Booking::from_record(location.record())?;
        if booking.status != BookingStatus::ConfirmedPayment {
            return Err(invalid(&code, booking.status.as_str(), "regenerate_ticket"));
        }
        let link = self.renderer.render(&TicketRequest::from(&booking)).await?;
        location
            .write(self.store.as_ref(), &[FieldUpdate::appendable(col::TICKET_LINK, link.as_str())])
            .await?;
        tracing::info!(ticket_code = %code, "ticket regenerated");
        booking.ticket_link = link;
        Ok(booking)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get(&self, code: &str) -> LedgerResult<Booking> {
        let code = TicketCode::parse(code)?;
        let location = locate(self.store.as_ref(), &self.table, col::ID, code.as_str()).await?;
        Booking::from_record(location.record())
    }

    /// Like [`get`](Self::get), but an unknown code is `None`.
    pub async fn find(&self, code: &str) -> LedgerResult<Option<Booking>> {
        match self.get(code).await {
            Ok(booking) => Ok(Some(booking)),
            Err(LedgerError::RecordNotFound { .. }) | Err(LedgerError::Validation(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn list(&self) -> LedgerResult<Vec<Booking>> {
        let records = self.store.read_all(&self.table).await?;
        let mut bookings = Vec::with_capacity(records.len());
        for record in &records {
            if record.get(col::ID).is_empty() {
                continue;
            }
            match Booking::from_record(record) {
                Ok(booking) => bookings.push(booking),
                Err(err) => tracing::warn!(table = %self.table, error = %err, "skipping malformed booking row"),
            }
        }
        Ok(bookings)
    }

    pub async fn list_for_buyer(&self, email: &str) -> LedgerResult<Vec<Booking>> {
        let mut bookings = self.list().await?;
        bookings.retain(|booking| same_email(&booking.email, email));
        Ok(bookings)
    }
}

fn invalid(code: &TicketCode, from: &str, edge: &str) -> LedgerError {
    LedgerError::InvalidTransition {
        id: code.to_string(),
        from: from.to_string(),
        edge: edge.to_string(),
    }
}

impl std::fmt::Debug for BookingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingLedger")
            .field("table", &self.table)
            .field("events_table", &self.events_table)
            .field("locks", &self.locks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DisabledTicketRenderer, LogNotifier};
    use async_trait::async_trait;
    use kemah_store::{CellRef, InMemoryRecordStore};
    use kemah_types::{MembershipTier, Rupiah};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TABLE: &str = "Event Reservation";
    const EVENTS: &str = "Events";

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TicketRenderer for CountingRenderer {
        async fn render(&self, request: &TicketRequest) -> LedgerResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://tickets/{}.pdf", request.ticket_code))
        }
    }

    fn store() -> Arc<InMemoryRecordStore> {
        Arc::new(InMemoryRecordStore::new().with_table(
            EVENTS,
            &["ID", "Activity", "price_alumni", "price_new_member", "price_general"],
            &[
                &["EV-1", "Kemah Akbar", "100000", "150000", ""],
                &["EV-2", "Jambore", "Rp 50.000", "Rp 75.000", "Rp 60.000"],
            ],
        ))
    }

    fn ledger(store: &Arc<InMemoryRecordStore>, renderer: Arc<dyn TicketRenderer>) -> BookingLedger {
        BookingLedger::new(store.clone(), renderer, Arc::new(LogNotifier), TABLE, EVENTS)
    }

    fn alumni() -> Buyer {
        Buyer::new("Siti", "siti@example.com", MembershipTier::Alumni)
    }

    fn request(event_id: &str) -> BookingRequest {
        BookingRequest {
            event_id: event_id.into(),
            participants: Some(2),
            phone: "08123".into(),
            tent_size: "4P".into(),
            client_price: Some("1".into()),
            ..BookingRequest::default()
        }
    }

    fn edit(store: &InMemoryRecordStore, code: &TicketCode, header: &str, value: &str) {
        let table = store.snapshot(TABLE).unwrap();
        let row = table.find_row(0, code.as_str()).unwrap();
        let column = table.column_index(header).unwrap();
        store.edit_cell(TABLE, CellRef::new(row, column), value).unwrap();
    }

    // --- creation and pricing ---

    #[tokio::test]
    async fn alumni_price_overrides_client_price() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        assert_eq!(booking.price, Rupiah(100_000));
        assert_eq!(booking.amount, Rupiah(200_000));

        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.price, Rupiah(100_000));
        assert_eq!(stored.status, BookingStatus::PendingPayment);
        assert_eq!(stored.tier, "Alumni");
        assert_eq!(stored.phone, "08123");

        let table = store.snapshot(TABLE).unwrap();
        let price_col = table.column_index(col::PRICE).unwrap();
        assert_eq!(table.rows[0][price_col], "Rp 100.000");
        let amount_col = table.column_index(col::AMOUNT).unwrap();
        assert_eq!(table.rows[0][amount_col], "200000");
    }

    #[tokio::test]
    async fn general_and_new_member_prices() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let general = Buyer::new("Budi", "budi@example.com", MembershipTier::General);
        assert_eq!(ledger.create(request("EV-1"), &general).await.unwrap().price, Rupiah(150_000));
        assert_eq!(ledger.create(request("EV-2"), &general).await.unwrap().price, Rupiah(60_000));
        let newbie = Buyer::new("Ani", "ani@example.com", MembershipTier::NewMember);
        assert_eq!(ledger.create(request("EV-2"), &newbie).await.unwrap().price, Rupiah(75_000));
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let err = ledger.create(request("EV-9"), &alumni()).await.unwrap_err();
        assert!(matches!(err, LedgerError::RecordNotFound { ref table, .. } if table == EVENTS));
        assert!(store.snapshot(TABLE).is_none());
    }

    #[tokio::test]
    async fn duplicate_rejected_until_cancelled() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let first = ledger.create(request("EV-1"), &alumni()).await.unwrap();

        let shouting = Buyer::new("Siti", "SITI@EXAMPLE.COM", MembershipTier::Alumni);
        let err = ledger.create(request("EV-1"), &shouting).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateBooking { .. }));
        assert_eq!(store.snapshot(TABLE).unwrap().len(), 1);

        ledger.create(request("EV-2"), &alumni()).await.unwrap();

        ledger.cancel(first.code.as_str()).await.unwrap();
        let again = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        assert_ne!(again.code, first.code);
    }

    #[tokio::test]
    async fn concurrent_creates_admit_one_booking() {
        let store = store();
        let ledger = Arc::new(ledger(&store, Arc::new(DisabledTicketRenderer)));
        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move { ledger.create(request("EV-1"), &alumni()).await }));
        }
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, LedgerError::DuplicateBooking { .. })),
            }
        }
        assert_eq!(created, 1);
    }

    // --- confirm payment ---

    #[tokio::test]
    async fn confirm_payment_writes_status_lot_and_ticket() {
        let store = store();
        let renderer = Arc::new(CountingRenderer::default());
        let ledger = ledger(&store, renderer.clone());
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();

        let t = ledger.confirm_payment(booking.code.as_str(), Some("B-3")).await.unwrap();
        assert!(t.outcome.is_applied());
        assert_eq!(t.record.lot, "B-3");
        let expected_link = format!("https://tickets/{}.pdf", booking.code);
        assert_eq!(t.record.ticket_link, expected_link);

        let again = ledger.confirm_payment(booking.code.as_str(), None).await.unwrap();
        assert!(!again.outcome.is_applied());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);

        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
        assert_eq!(stored.lot, "B-3");
        assert_eq!(stored.ticket_link, expected_link);
    }

    #[tokio::test]
    async fn renderer_failure_does_not_block_confirmation() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        let t = ledger.confirm_payment(booking.code.as_str(), None).await.unwrap();
        assert!(t.outcome.is_applied());
        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
        assert_eq!(stored.ticket_link, "");
        assert!(matches!(
            ledger.regenerate_ticket(booking.code.as_str()).await,
            Err(LedgerError::Collaborator { .. })
        ));
    }

    #[tokio::test]
    async fn officer_lot_applies_after_gateway_confirmation() {
        let store = store();
        let renderer = Arc::new(CountingRenderer::default());
        let ledger = ledger(&store, renderer.clone());
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();

        ledger.confirm_payment(booking.code.as_str(), None).await.unwrap();
        let t = ledger.confirm_payment(booking.code.as_str(), Some("B-3")).await.unwrap();
        assert!(t.outcome.is_applied());
        assert_eq!(t.record.lot, "B-3");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);

        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
        assert_eq!(stored.lot, "B-3");

        let writes = store.write_count();
        let same = ledger.confirm_payment(booking.code.as_str(), Some("B-3")).await.unwrap();
        assert!(!same.outcome.is_applied());
        assert_eq!(store.write_count(), writes);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);

        // a placeholder never replaces an assigned lot
        let placeholder = ledger.confirm_payment(booking.code.as_str(), Some("TBA")).await.unwrap();
        assert!(!placeholder.outcome.is_applied());
        assert_eq!(placeholder.record.lot, "B-3");
        assert_eq!(store.write_count(), writes);
    }

    /// Renders fine, then takes the store down before the link is written.
    struct OutageRenderer {
        store: Arc<InMemoryRecordStore>,
    }

    #[async_trait]
    impl TicketRenderer for OutageRenderer {
        async fn render(&self, request: &TicketRequest) -> LedgerResult<String> {
            self.store.set_unavailable(true);
            Ok(format!("https://tickets/{}.pdf", request.ticket_code))
        }
    }

    #[tokio::test]
    async fn ticket_link_write_failure_keeps_confirmation() {
        let store = store();
        let ledger = ledger(&store, Arc::new(OutageRenderer { store: store.clone() }));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();

        let t = ledger.confirm_payment(booking.code.as_str(), None).await.unwrap();
        assert!(t.outcome.is_applied());
        assert_eq!(t.record.ticket_link, "");

        store.set_unavailable(false);
        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
        assert_eq!(stored.ticket_link, "");
    }

    #[tokio::test]
    async fn cancelled_booking_cannot_be_confirmed() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        ledger.cancel(booking.code.as_str()).await.unwrap();
        let writes = store.write_count();
        let err = ledger.confirm_payment(booking.code.as_str(), Some("A-1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(store.write_count(), writes);
    }

    // --- lots and check-in ---

    #[tokio::test]
    async fn check_in_requires_a_lot() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        ledger.confirm_payment(booking.code.as_str(), None).await.unwrap();

        let err = ledger.check_in(booking.code.as_str()).await.unwrap_err();
        assert_eq!(err, LedgerError::LotNotAssigned(booking.code.to_string()));
        assert!(!ledger.get(booking.code.as_str()).await.unwrap().checked_in);

        edit(&store, &booking.code, col::LOT, "TBA");
        assert!(matches!(
            ledger.check_in(booking.code.as_str()).await,
            Err(LedgerError::LotNotAssigned(_))
        ));
        assert!(!ledger.get(booking.code.as_str()).await.unwrap().checked_in);

        assert!(matches!(
            ledger.assign_lot(booking.code.as_str(), "tba").await,
            Err(LedgerError::Validation(_))
        ));
        ledger.assign_lot(booking.code.as_str(), "C-7").await.unwrap();
        let t = ledger.check_in(booking.code.as_str()).await.unwrap();
        assert!(t.outcome.is_applied());
        let again = ledger.check_in(booking.code.as_str()).await.unwrap();
        assert!(!again.outcome.is_applied());

        let table = store.snapshot(TABLE).unwrap();
        let column = table.column_index(col::CHECK_IN).unwrap();
        assert_eq!(table.rows[0][column], "Yes");
    }

    #[tokio::test]
    async fn unpaid_booking_cannot_check_in() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let mut req = request("EV-1");
        req.lot = Some("A-1".into());
        let booking = ledger.create(req, &alumni()).await.unwrap();
        assert!(matches!(
            ledger.check_in(booking.code.as_str()).await,
            Err(LedgerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn checked_in_booking_cannot_be_cancelled() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        ledger.confirm_payment(booking.code.as_str(), Some("A-1")).await.unwrap();
        ledger.check_in(booking.code.as_str()).await.unwrap();
        assert!(matches!(
            ledger.cancel(booking.code.as_str()).await,
            Err(LedgerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn lookups_follow_rows_moved_by_humans() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        let booking = ledger.create(request("EV-1"), &alumni()).await.unwrap();
        store.insert_column(TABLE, 0, "No.").unwrap();
        ledger.confirm_payment(booking.code.as_str(), Some("D-2")).await.unwrap();
        let stored = ledger.get(booking.code.as_str()).await.unwrap();
        assert_eq!(stored.lot, "D-2");
        assert_eq!(stored.status, BookingStatus::ConfirmedPayment);
    }

    #[tokio::test]
    async fn list_for_buyer_filters_by_email() {
        let store = store();
        let ledger = ledger(&store, Arc::new(DisabledTicketRenderer));
        ledger.create(request("EV-1"), &alumni()).await.unwrap();
        ledger
            .create(request("EV-1"), &Buyer::new("Budi", "budi@example.com", MembershipTier::General))
            .await
            .unwrap();
        assert_eq!(ledger.list().await.unwrap().len(), 2);
        assert_eq!(ledger.list_for_buyer("Siti@Example.com").await.unwrap().len(), 1);
        assert!(ledger.find("NOPE0000").await.unwrap().is_none());
    }
}
