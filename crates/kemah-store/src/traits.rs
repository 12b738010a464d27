use async_trait::async_trait;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::table::{normalize_header, CellRef, Record, Table};

/// What [`RecordStore::ensure_schema`] found and did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// The table was missing and has been created with the requested headers.
    Created,
    /// The table existed with a blank header row; the headers were written.
    HeadersWritten,
    /// Every requested header is present.
    Present,
    /// The table has a header row that lacks some requested headers. Nothing
    /// was changed; columns appended on demand are not expected to be listed.
    Drifted { missing: Vec<String> },
}

/// Header-driven tabular storage.
///
/// All implementations must satisfy these invariants:
/// - Row 1 of a table is the header row. Data rows start at row 2.
/// - `append` is the only insert path and always adds the row at the end.
/// - `write_cell` overwrites exactly one cell and nothing else.
/// - Reads reflect the live layout. No implementation caches row or column
///   positions between calls, because humans edit the sheet concurrently.
/// - A missing table is reported as [`StoreError::TableNotFound`], never as
///   an empty table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns `true` if the named table exists.
    async fn table_exists(&self, table: &str) -> StoreResult<bool>;

    /// Create an empty table whose header row is `headers`.
    async fn create_table(&self, table: &str, headers: &[&str]) -> StoreResult<()>;

    /// Read the raw grid of a table: the header row plus every data row.
    async fn read_table(&self, table: &str) -> StoreResult<Table>;

    /// Append one row after the last data row. Values are positioned by the
    /// caller to match the current header order.
    async fn append(&self, table: &str, values: &[String]) -> StoreResult<()>;

    /// Overwrite exactly one cell.
    async fn write_cell(&self, table: &str, cell: CellRef, value: &str) -> StoreResult<()>;

    /// Guarantee the table exists and has a non-blank header row.
    ///
    /// Missing tables are created with `headers`. An existing table with a
    /// blank header row gets `headers` written into row 1. An existing header
    /// row is never rewritten or reordered; if it lacks any of `headers` the
    /// result is [`SchemaStatus::Drifted`].
    async fn ensure_schema(&self, table: &str, headers: &[&str]) -> StoreResult<SchemaStatus> {
        if !self.table_exists(table).await? {
            self.create_table(table, headers).await?;
            tracing::info!(table, columns = headers.len(), "created table");
            return Ok(SchemaStatus::Created);
        }

        let current = self.read_table(table).await?;
        if !current.has_headers() {
            for (column, header) in headers.iter().enumerate() {
                self.write_cell(table, CellRef::header(column), header).await?;
            }
            tracing::info!(table, columns = headers.len(), "wrote header row");
            return Ok(SchemaStatus::HeadersWritten);
        }

        let existing: Vec<String> = current.headers.iter().map(|h| normalize_header(h)).collect();
        let missing: Vec<String> = headers
            .iter()
            .filter(|h| !existing.contains(&normalize_header(h)))
            .map(|h| h.to_string())
            .collect();
        if missing.is_empty() {
            Ok(SchemaStatus::Present)
        } else {
            tracing::warn!(table, ?missing, "header row is missing expected columns");
            Ok(SchemaStatus::Drifted { missing })
        }
    }

    /// Decode every data row against the current header row.
    async fn read_all(&self, table: &str) -> StoreResult<Vec<Record>> {
        Ok(self.read_table(table).await?.records())
    }
}

/// Convenience used by writers: surface a missing table with its name even
/// when a backend reports it generically.
pub(crate) fn table_not_found(table: &str) -> StoreError {
    StoreError::TableNotFound(table.to_string())
}
