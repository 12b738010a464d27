//! Key-to-row and header-to-column resolution for targeted cell writes.
//!
//! Every [`locate`] call performs a fresh [`RecordStore::read_table`]. The
//! sheet may have been edited by a human between two service calls (rows
//! sorted, columns inserted), so a remembered position could point at the
//! wrong cell. A [`Location`] is only valid for the writes that immediately
//! follow it.

use crate::error::{StoreError, StoreResult};
use crate::table::{normalize_header, CellRef, Record, Table};
use crate::traits::RecordStore;

/// What to do when an update names a header the table does not have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnMissing {
    /// Fail with [`StoreError::ColumnNotFound`].
    Fail,
    /// Write the header into the next free column of row 1, then the cell.
    Append,
}

/// One single-cell write, addressed by header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldUpdate {
    pub header: String,
    pub value: String,
    pub on_missing: OnMissing,
}

impl FieldUpdate {
    /// Update of a column that must already exist.
    pub fn required(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
            on_missing: OnMissing::Fail,
        }
    }

    /// Update of a metadata column that is created on first use.
    pub fn appendable(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
            on_missing: OnMissing::Append,
        }
    }
}

/// The physical position of one record, resolved from a single read.
#[derive(Clone, Debug)]
pub struct Location {
    table: String,
    headers: Vec<String>,
    key_column: usize,
    row: usize,
    record: Record,
}

/// Read `table` and find the first data row whose `key_header` cell equals
/// `id` (both trimmed).
pub async fn locate<S>(store: &S, table: &str, key_header: &str, id: &str) -> StoreResult<Location>
where
    S: RecordStore + ?Sized,
{
    let grid = store.read_table(table).await?;
    locate_in(table, &grid, key_header, id)
}

/// [`locate`] against a grid the caller already holds.
pub fn locate_in(table: &str, grid: &Table, key_header: &str, id: &str) -> StoreResult<Location> {
    let key_column = grid
        .column_index(key_header)
        .ok_or_else(|| column_not_found(table, key_header))?;
    let row = grid
        .find_row(key_column, id)
        .ok_or_else(|| StoreError::RecordNotFound {
            table: table.to_string(),
            key: normalize_header(key_header),
            id: id.trim().to_string(),
        })?;
    let record = grid.record_at(row).unwrap_or_default();
    Ok(Location {
        table: table.to_string(),
        headers: grid.headers.clone(),
        key_column,
        row,
        record,
    })
}

impl Location {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// One-based physical row of the record.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    /// Snapshot of the row as it was read.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Zero-based column of a header, if present.
    pub fn column(&self, header: &str) -> Option<usize> {
        let wanted = normalize_header(header);
        if wanted.is_empty() {
            return None;
        }
        self.headers.iter().position(|h| normalize_header(h) == wanted)
    }

    /// Cell of `header` on this record's row.
    pub fn cell(&self, header: &str) -> StoreResult<CellRef> {
        self.column(header)
            .map(|column| CellRef::new(self.row, column))
            .ok_or_else(|| column_not_found(&self.table, header))
    }

    /// Fail with `ColumnNotFound` unless every header is present.
    pub fn require(&self, headers: &[&str]) -> StoreResult<()> {
        for header in headers {
            self.cell(header)?;
        }
        Ok(())
    }

    /// Apply `updates` one cell at a time, in order.
    ///
    /// Every [`OnMissing::Fail`] header is checked before the first write, so
    /// a missing required column writes nothing. The sequence is not atomic:
    /// a store failure midway leaves the earlier cells written.
    pub async fn write<S>(&mut self, store: &S, updates: &[FieldUpdate]) -> StoreResult<()>
    where
        S: RecordStore + ?Sized,
    {
        for update in updates.iter().filter(|u| u.on_missing == OnMissing::Fail) {
            self.cell(&update.header)?;
        }

        for update in updates {
            let column = match self.column(&update.header) {
                Some(column) => column,
                None => self.append_header(store, &update.header).await?,
            };
            store
                .write_cell(&self.table, CellRef::new(self.row, column), &update.value)
                .await?;
        }
        Ok(())
    }

    async fn append_header<S>(&mut self, store: &S, header: &str) -> StoreResult<usize>
    where
        S: RecordStore + ?Sized,
    {
        let column = self
            .headers
            .iter()
            .rposition(|h| !h.trim().is_empty())
            .map_or(0, |last| last + 1);
        store
            .write_cell(&self.table, CellRef::header(column), header)
            .await?;
        if self.headers.len() <= column {
            self.headers.resize(column + 1, String::new());
        }
        self.headers[column] = header.to_string();
        tracing::info!(table = %self.table, column = %CellRef::header(column), header, "appended column");
        Ok(column)
    }
}

fn column_not_found(table: &str, header: &str) -> StoreError {
    StoreError::ColumnNotFound {
        table: table.to_string(),
        column: header.to_string(),
    }
}
