//! Record store over a non-transactional spreadsheet backend.
//!
//! A spreadsheet is treated as a set of named tables. Row 1 of each table
//! holds human-readable headers; every other row is data. Nothing in the
//! medium enforces types, keys or row layout, and humans edit the sheet while
//! the service is running.
//!
//! # Layers
//!
//! - [`Table`] / [`Record`] -- the raw grid and its schema-on-read decode
//! - [`RecordStore`] -- the storage contract (`ensure_schema`, `read_all`,
//!   `append`, `write_cell`)
//! - [`locator`] -- resolves a key value to a physical row and a header to a
//!   physical column, re-reading the live layout on every call
//!
//! # Backends
//!
//! - [`InMemoryRecordStore`] -- in-process grid for tests and embedding
//! - [`SheetsRecordStore`] -- Google Sheets API v4 over HTTPS
//!
//! # Design Rules
//!
//! 1. Appending a row is the only insert path.
//! 2. Every update is a single-cell write. There is no multi-field update.
//! 3. Row layout is never cached between calls.
//! 4. A missing table is a configuration error and is always surfaced.

pub mod error;
pub mod locator;
pub mod memory;
pub mod sheets;
pub mod table;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use locator::{locate, FieldUpdate, Location, OnMissing};
pub use memory::InMemoryRecordStore;
pub use sheets::{SheetsConfig, SheetsRecordStore};
pub use table::{column_letter, normalize_header, CellRef, Record, Table};
pub use traits::{RecordStore, SchemaStatus};
