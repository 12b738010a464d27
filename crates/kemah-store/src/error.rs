/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The named table does not exist. Writers must call `ensure_schema`
    /// first; for readers this is a configuration fault.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A required header is absent from the table's header row.
    #[error("column {column:?} not found in table {table:?}")]
    ColumnNotFound { table: String, column: String },

    /// No data row carries the requested key value.
    #[error("no row in table {table:?} with {key} = {id:?}")]
    RecordNotFound {
        table: String,
        key: String,
        id: String,
    },

    /// Network, quota or authentication failure talking to the backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A cell reference outside the addressable grid.
    #[error("invalid cell reference: row {row}, column {column}")]
    InvalidCell { row: usize, column: usize },

    /// The backend answered with something that could not be decoded.
    #[error("malformed store response: {0}")]
    Decode(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
