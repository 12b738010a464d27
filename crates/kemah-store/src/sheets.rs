//! Google Sheets API v4 backend.
//!
//! Each table is one sheet (tab) of a single spreadsheet. Cell values are
//! written with `valueInputOption=USER_ENTERED`, matching what a human typing
//! into the sheet would produce. Access-token acquisition is delegated: the
//! caller supplies a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{StoreError, StoreResult};
use crate::table::{CellRef, Table};
use crate::traits::{table_not_found, RecordStore};

fn default_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for [`SheetsRecordStore`].
#[derive(Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            access_token: String::new(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("access_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Record store over one Google spreadsheet.
#[derive(Clone)]
pub struct SheetsRecordStore {
    config: SheetsConfig,
    http: reqwest::Client,
}

impl SheetsRecordStore {
    pub fn new(config: SheetsConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.spreadsheet_id
        )
    }

    /// URL of a values range. The range becomes one percent-encoded path
    /// segment, so sheet titles may contain `#`, `?` or `/`.
    fn values_url(&self, range: &str) -> StoreResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.spreadsheet_url())
            .map_err(|e| StoreError::Unavailable(format!("sheets url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("sheets api base cannot take a path".into()))?
            .extend(["values", range]);
        Ok(url)
    }

    async fn send(&self, table: &str, request: reqwest::RequestBuilder) -> StoreResult<Value> {
        let response = request
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()));
        }

        let message = api_error_message(&body);
        tracing::debug!(table, status = status.as_u16(), %message, "sheets api error");
        Err(classify(table, status, message))
    }
}

/// Quote a sheet title for A1 notation: `Market OB` → `'Market OB'`.
pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn classify(table: &str, status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => table_not_found(table),
        StatusCode::BAD_REQUEST if message.contains("Unable to parse range") => {
            table_not_found(table)
        }
        s if s == StatusCode::UNAUTHORIZED
            || s == StatusCode::FORBIDDEN
            || s == StatusCode::TOO_MANY_REQUESTS
            || s.is_server_error() =>
        {
            StoreError::Unavailable(format!("http {}: {message}", s.as_u16()))
        }
        s => StoreError::Decode(format!("http {}: {message}", s.as_u16())),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_grid(body: &Value) -> StoreResult<Vec<Vec<String>>> {
    let Some(values) = body.get("values") else {
        return Ok(Vec::new());
    };
    let rows = values
        .as_array()
        .ok_or_else(|| StoreError::Decode("values is not an array".into()))?;
    rows.iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect())
                .ok_or_else(|| StoreError::Decode("row is not an array".into()))
        })
        .collect()
}

#[async_trait]
impl RecordStore for SheetsRecordStore {
    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        let request = self
            .http
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties.title")]);
        let body = self.send(table, request).await?;
        let exists = body["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .any(|s| s["properties"]["title"].as_str() == Some(table))
            })
            .unwrap_or(false);
        Ok(exists)
    }

    async fn create_table(&self, table: &str, headers: &[&str]) -> StoreResult<()> {
        let request = self
            .http
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": table } } }]
            }));
        self.send(table, request).await?;

        if !headers.is_empty() {
            let range = format!("{}!A1", quote_sheet(table));
            let request = self
                .http
                .put(self.values_url(&range)?)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&json!({ "range": range, "values": [headers] }));
            self.send(table, request).await?;
        }
        Ok(())
    }

    async fn read_table(&self, table: &str) -> StoreResult<Table> {
        let request = self.http.get(self.values_url(&quote_sheet(table))?);
        let body = self.send(table, request).await?;
        Ok(Table::from_grid(decode_grid(&body)?))
    }

    async fn append(&self, table: &str, values: &[String]) -> StoreResult<()> {
        let request = self
            .http
            .post(self.values_url(&format!("{}:append", quote_sheet(table)))?)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [values] }));
        self.send(table, request).await?;
        Ok(())
    }

    async fn write_cell(&self, table: &str, cell: CellRef, value: &str) -> StoreResult<()> {
        if cell.row == 0 {
            return Err(StoreError::InvalidCell {
                row: cell.row,
                column: cell.column,
            });
        }
        let range = format!("{}!{}", quote_sheet(table), cell.a1());
        let request = self
            .http
            .put(self.values_url(&range)?)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "range": range, "values": [[value]] }));
        self.send(table, request).await?;
        Ok(())
    }
}

impl std::fmt::Debug for SheetsRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsRecordStore")
            .field("config", &self.config)
            .finish()
    }
}
