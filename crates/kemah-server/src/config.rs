use std::net::SocketAddr;
use std::path::Path;

use kemah_ledger::{SnapPaymentGateway, Tables};
use kemah_store::SheetsConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Environment variable overriding `sheets.access_token`.
pub const ENV_SHEETS_TOKEN: &str = "KEMAH_SHEETS_TOKEN";
/// Environment variable overriding `gateway.server_key`.
pub const ENV_GATEWAY_SERVER_KEY: &str = "KEMAH_GATEWAY_SERVER_KEY";

/// Which record store backs the ledgers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sheets,
    /// Process-local tables; everything is lost on exit.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store: StoreBackend::Sheets,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Key used to verify notification signatures and to open checkout
    /// sessions. Blank disables both.
    pub server_key: String,
    /// Snap API host; the sandbox unless overridden.
    pub api_base: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            api_base: SnapPaymentGateway::SANDBOX_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.server_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("GatewayConfig")
            .field("server_key", &key)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketsConfig {
    /// Endpoint of the ticket rendering service. Unset disables rendering.
    pub renderer_url: Option<String>,
}

/// Complete service configuration, read from a TOML file.
///
/// ```toml
/// [server]
/// bind_addr = "0.0.0.0:8080"
///
/// [sheets]
/// spreadsheet_id = "1AbC..."
///
/// [tables]
/// orders = "Market OB"
///
/// [gateway]
/// api_base = "https://app.midtrans.com"
///
/// [tickets]
/// renderer_url = "https://tickets.internal/render"
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sheets: SheetsConfig,
    pub tables: Tables,
    pub gateway: GatewayConfig,
    pub tickets: TicketsConfig,
}

impl AppConfig {
    /// Load from `path` (or defaults when `None`), then apply environment
    /// overrides for secrets.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Replace secrets with values from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_SHEETS_TOKEN).filter(|v| !v.is_empty()) {
            self.sheets.access_token = token;
        }
        if let Some(key) = lookup(ENV_GATEWAY_SERVER_KEY).filter(|v| !v.is_empty()) {
            self.gateway.server_key = key;
        }
    }

    /// Check settings that cannot be defaulted.
    pub fn validate(&self) -> ServerResult<()> {
        if self.server.store == StoreBackend::Sheets && self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(ServerError::Config("sheets.spreadsheet_id is required".into()));
        }
        Ok(())
    }
}
