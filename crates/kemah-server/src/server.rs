use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Kemah API server.
pub struct KemahServer {
    config: AppConfig,
    state: Arc<AppState>,
}

impl KemahServer {
    pub fn new(config: AppConfig) -> ServerResult<Self> {
        let state = Arc::new(AppState::from_config(&config)?);
        Ok(Self { config, state })
    }

    pub fn with_state(config: AppConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Router with request tracing and CORS attached.
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Provision tables, then serve requests until the process is stopped.
    pub async fn serve(self) -> ServerResult<()> {
        for (table, status) in self.state.ensure_schema().await? {
            tracing::info!(%table, ?status, "schema checked");
        }
        let app = self.router();
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        tracing::info!(addr = %self.config.server.bind_addr, "kemah server listening");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.store = StoreBackend::Memory;
        config
    }

    #[test]
    fn server_construction() {
        let server = KemahServer::new(memory_config()).unwrap();
        assert_eq!(server.config().server.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(server.state().orders.table(), "Market OB");
        let _router = server.router();
    }

    #[test]
    fn sheets_backend_requires_spreadsheet() {
        assert!(matches!(KemahServer::new(AppConfig::default()), Err(ServerError::Config(_))));
    }

    #[test]
    fn gateway_key_enables_verification() {
        let mut config = memory_config();
        config.gateway.server_key = "sk".into();
        let server = KemahServer::new(config).unwrap();
        assert!(server.state().reconciler.verifies_signatures());
    }
}
