use std::sync::Arc;

use kemah_ledger::{
    BookingLedger, Catalog, Checkout, DisabledPaymentGateway, DisabledTicketRenderer, HttpTicketRenderer,
    LogNotifier, Notifier, OrderLedger, PaymentGateway, SheetCatalog, SnapPaymentGateway, Tables, TicketRenderer,
};
use kemah_reconcile::PaymentReconciler;
use kemah_store::{InMemoryRecordStore, RecordStore, SchemaStatus, SheetsRecordStore};

use crate::auth::{OfficerRoster, SheetOfficerRoster};
use crate::config::{AppConfig, StoreBackend};
use crate::error::ServerResult;

/// Shared state handed to every handler.
pub struct AppState {
    pub orders: Arc<OrderLedger>,
    pub bookings: Arc<BookingLedger>,
    pub reconciler: Arc<PaymentReconciler>,
    pub checkout: Arc<Checkout>,
    pub roster: Arc<dyn OfficerRoster>,
}

/// Collaborators a deployment wires into [`AppState`].
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub catalog: Arc<dyn Catalog>,
    pub renderer: Arc<dyn TicketRenderer>,
    pub notifier: Arc<dyn Notifier>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub roster: Arc<dyn OfficerRoster>,
    pub tables: Tables,
    pub gateway_server_key: String,
}

impl Services {
    /// Defaults over one store: catalog and officer roster read from their
    /// tables, logged notifications, no ticket rendering, no checkout.
    pub fn over_store(store: Arc<dyn RecordStore>, tables: Tables) -> Self {
        Self {
            catalog: Arc::new(SheetCatalog::new(store.clone(), tables.catalog.clone())),
            roster: Arc::new(SheetOfficerRoster::new(store.clone(), tables.officers.clone())),
            renderer: Arc::new(DisabledTicketRenderer),
            notifier: Arc::new(LogNotifier),
            gateway: Arc::new(DisabledPaymentGateway),
            gateway_server_key: String::new(),
            store,
            tables,
        }
    }
}

impl AppState {
    pub fn new(services: Services) -> Self {
        let Services {
            store,
            catalog,
            renderer,
            notifier,
            gateway,
            roster,
            tables,
            gateway_server_key,
        } = services;
        let orders = Arc::new(OrderLedger::new(
            store.clone(),
            catalog,
            notifier.clone(),
            tables.orders.clone(),
        ));
        let bookings = Arc::new(BookingLedger::new(
            store,
            renderer,
            notifier,
            tables.bookings.clone(),
            tables.events.clone(),
        ));
        let reconciler = Arc::new(
            PaymentReconciler::new(bookings.clone(), orders.clone()).with_server_key(gateway_server_key),
        );
        let checkout = Arc::new(Checkout::new(orders.clone(), bookings.clone(), gateway));
        Self {
            orders,
            bookings,
            reconciler,
            checkout,
            roster,
        }
    }

    /// Wire the state described by `config`.
    pub fn from_config(config: &AppConfig) -> ServerResult<Self> {
        config.validate()?;
        let store: Arc<dyn RecordStore> = match config.server.store {
            StoreBackend::Sheets => Arc::new(SheetsRecordStore::new(config.sheets.clone())?),
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is not persisted");
                Arc::new(InMemoryRecordStore::new())
            }
        };
        let mut services = Services::over_store(store, config.tables.clone());
        services.gateway_server_key = config.gateway.server_key.clone();
        if let Some(url) = config.tickets.renderer_url.as_deref().filter(|u| !u.trim().is_empty()) {
            services.renderer = Arc::new(HttpTicketRenderer::new(url)?);
        }
        if !services.gateway_server_key.is_empty() {
            services.gateway = Arc::new(SnapPaymentGateway::new(
                &config.gateway.api_base,
                services.gateway_server_key.clone(),
            )?);
            tracing::info!(api_base = %config.gateway.api_base, "gateway checkout and signature verification enabled");
        }
        Ok(Self::new(services))
    }

    /// Provision the order and booking tables.
    pub async fn ensure_schema(&self) -> ServerResult<Vec<(String, SchemaStatus)>> {
        Ok(vec![
            (self.orders.table().to_string(), self.orders.ensure_schema().await?),
            (self.bookings.table().to_string(), self.bookings.ensure_schema().await?),
        ])
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orders", &self.orders)
            .field("bookings", &self.bookings)
            .field("reconciler", &self.reconciler)
            .field("checkout", &self.checkout)
            .finish()
    }
}
