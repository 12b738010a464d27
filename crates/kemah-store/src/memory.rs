use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::table::{CellRef, Table};
use crate::traits::{table_not_found, RecordStore};

/// In-memory spreadsheet.
///
/// Intended for tests and embedding. Tables are held behind a `RwLock` and
/// cloned on read, so a caller never observes a half-applied write. The
/// out-of-band helpers ([`edit_cell`](Self::edit_cell),
/// [`insert_column`](Self::insert_column)) simulate a human editing the
/// sheet between two service calls.
pub struct InMemoryRecordStore {
    tables: RwLock<BTreeMap<String, Table>>,
    writes: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create an empty store with no tables.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Seed a table with a header row and data rows.
    pub fn with_table(self, name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        let table = Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        );
        self.tables
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), table);
        self
    }

    /// Overwrite a cell without counting it as a service write.
    pub fn edit_cell(&self, table: &str, cell: CellRef, value: &str) -> StoreResult<()> {
        let mut map = self.tables.write().expect("lock poisoned");
        let grid = map.get_mut(table).ok_or_else(|| table_not_found(table))?;
        put_cell(grid, cell, value)
    }

    /// Insert a column at `index`, shifting every later column right.
    pub fn insert_column(&self, table: &str, index: usize, header: &str) -> StoreResult<()> {
        let mut map = self.tables.write().expect("lock poisoned");
        let grid = map.get_mut(table).ok_or_else(|| table_not_found(table))?;
        if index > grid.headers.len() {
            grid.headers.resize(index, String::new());
        }
        grid.headers.insert(index, header.to_string());
        for row in grid.rows.iter_mut() {
            if index <= row.len() {
                row.insert(index, String::new());
            }
        }
        Ok(())
    }

    /// Clone of a table's current grid.
    pub fn snapshot(&self, table: &str) -> Option<Table> {
        self.tables.read().expect("lock poisoned").get(table).cloned()
    }

    /// Number of `append` and `write_cell` calls that reached the grid.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().expect("lock poisoned").keys().cloned().collect()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

fn put_cell(grid: &mut Table, cell: CellRef, value: &str) -> StoreResult<()> {
    let target = match cell.row {
        0 => {
            return Err(StoreError::InvalidCell {
                row: cell.row,
                column: cell.column,
            })
        }
        1 => &mut grid.headers,
        n => {
            let index = n - 2;
            if grid.rows.len() <= index {
                grid.rows.resize(index + 1, Vec::new());
            }
            &mut grid.rows[index]
        }
    };
    if target.len() <= cell.column {
        target.resize(cell.column + 1, String::new());
    }
    target[cell.column] = value.to_string();
    Ok(())
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.tables.read().expect("lock poisoned").contains_key(table))
    }

    async fn create_table(&self, table: &str, headers: &[&str]) -> StoreResult<()> {
        self.check_available()?;
        let mut map = self.tables.write().expect("lock poisoned");
        map.entry(table.to_string()).or_insert_with(|| {
            Table::new(headers.iter().map(|h| h.to_string()).collect(), Vec::new())
        });
        Ok(())
    }

    async fn read_table(&self, table: &str) -> StoreResult<Table> {
        self.check_available()?;
        self.snapshot(table).ok_or_else(|| table_not_found(table))
    }

    async fn append(&self, table: &str, values: &[String]) -> StoreResult<()> {
        self.check_available()?;
        let mut map = self.tables.write().expect("lock poisoned");
        let grid = map.get_mut(table).ok_or_else(|| table_not_found(table))?;
        // The sheets API appends to the first empty row of the detected
        // table, which is the header row when the table is blank.
        if !grid.has_headers() && grid.rows.is_empty() {
            grid.headers = values.to_vec();
        } else {
            grid.rows.push(values.to_vec());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_cell(&self, table: &str, cell: CellRef, value: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut map = self.tables.write().expect("lock poisoned");
        let grid = map.get_mut(table).ok_or_else(|| table_not_found(table))?;
        put_cell(grid, cell, value)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryRecordStore")
            .field("table_count", &tables)
            .field("writes", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SchemaStatus;

    fn orders() -> InMemoryRecordStore {
        InMemoryRecordStore::new().with_table(
            "Orders",
            &["Order ID", "Item Name", "Status"],
            &[&["AAA", "Tent", "Paid"], &["BBB"]],
        )
    }

    // --- reads ---

    #[tokio::test]
    async fn read_all_decodes_ragged_rows() {
        let store = orders();
        let records = store.read_all("Orders").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("item_name"), "Tent");
        assert_eq!(records[1].get("status"), "");
    }

    #[tokio::test]
    async fn missing_table_is_surfaced() {
        let store = InMemoryRecordStore::new();
        let err = store.read_all("Nope").await.unwrap_err();
        assert_eq!(err, StoreError::TableNotFound("Nope".into()));
        let err = store
            .write_cell("Nope", CellRef::new(2, 0), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn empty_table_reads_as_no_records() {
        let store = InMemoryRecordStore::new().with_table("Empty", &["A"], &[]);
        assert!(store.read_all("Empty").await.unwrap().is_empty());
    }

    // --- writes ---

    #[tokio::test]
    async fn write_cell_extends_short_rows() {
        let store = orders();
        store.write_cell("Orders", CellRef::new(3, 2), "Paid").await.unwrap();
        let records = store.read_all("Orders").await.unwrap();
        assert_eq!(records[1].get("status"), "Paid");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn write_cell_rejects_row_zero() {
        let store = orders();
        let err = store.write_cell("Orders", CellRef::new(0, 0), "x").await.unwrap_err();
        assert_eq!(err, StoreError::InvalidCell { row: 0, column: 0 });
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn append_goes_to_the_end() {
        let store = orders();
        store
            .append("Orders", &["CCC".into(), "Stove".into(), "Pending Payment".into()])
            .await
            .unwrap();
        let table = store.snapshot("Orders").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2][0], "CCC");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = orders();
        store.set_unavailable(true);
        assert!(matches!(
            store.read_all("Orders").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.read_all("Orders").await.is_ok());
    }

    // --- out-of-band edits ---

    #[tokio::test]
    async fn insert_column_shifts_cells() {
        let store = orders();
        store.insert_column("Orders", 1, "Notes").unwrap();
        let table = store.snapshot("Orders").unwrap();
        assert_eq!(table.headers, vec!["Order ID", "Notes", "Item Name", "Status"]);
        assert_eq!(table.rows[0], vec!["AAA", "", "Tent", "Paid"]);
        assert_eq!(table.rows[1], vec!["BBB"]);
        assert_eq!(store.write_count(), 0);
    }

    // --- ensure_schema ---

    #[tokio::test]
    async fn ensure_schema_creates_missing_table() {
        let store = InMemoryRecordStore::new();
        let status = store.ensure_schema("Orders", &["Order ID", "Status"]).await.unwrap();
        assert_eq!(status, SchemaStatus::Created);
        assert_eq!(store.snapshot("Orders").unwrap().headers, vec!["Order ID", "Status"]);
        let again = store.ensure_schema("Orders", &["Order ID", "Status"]).await.unwrap();
        assert_eq!(again, SchemaStatus::Present);
    }

    #[tokio::test]
    async fn ensure_schema_fills_blank_header_row() {
        let store = InMemoryRecordStore::new().with_table("Orders", &[], &[]);
        let status = store.ensure_schema("Orders", &["Order ID", "Status"]).await.unwrap();
        assert_eq!(status, SchemaStatus::HeadersWritten);
        assert_eq!(store.snapshot("Orders").unwrap().headers, vec!["Order ID", "Status"]);
    }

    #[tokio::test]
    async fn ensure_schema_reports_drift_without_repairing() {
        let store = orders();
        let status = store
            .ensure_schema("Orders", &["Order ID", "Item Name", "Quantity", "Status"])
            .await
            .unwrap();
        assert_eq!(
            status,
            SchemaStatus::Drifted {
                missing: vec!["Quantity".into()]
            }
        );
        assert_eq!(store.snapshot("Orders").unwrap().headers.len(), 3);
        assert_eq!(store.write_count(), 0);
    }
}
