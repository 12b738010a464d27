use kemah_store::Table;

use crate::error::{LedgerError, LedgerResult};

/// Attempts at drawing an id that no existing row already uses.
pub(crate) const MAX_ID_ATTEMPTS: usize = 8;

/// Draw ids from `generate` until one is absent from the `key_header`
/// column of `grid`.
pub(crate) fn unique_code<T: AsRef<str>>(
    grid: &Table,
    key_header: &str,
    generate: impl Fn() -> T,
) -> LedgerResult<T> {
    let Some(column) = grid.column_index(key_header) else {
        return Ok(generate());
    };
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = generate();
        if grid.find_row(column, candidate.as_ref()).is_none() {
            return Ok(candidate);
        }
        tracing::warn!(id = candidate.as_ref(), "generated id collides with an existing row");
    }
    Err(LedgerError::Configuration(format!(
        "no unique {key_header} after {MAX_ID_ATTEMPTS} attempts"
    )))
}

/// Fail with `ColumnNotFound` unless the header row has every column.
pub(crate) fn require_columns(grid: &Table, table: &str, headers: &[&str]) -> LedgerResult<()> {
    match headers.iter().find(|h| grid.column_index(h).is_none()) {
        Some(missing) => Err(LedgerError::ColumnNotFound {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Timestamp written to date columns: `2025-01-31 13:45:00` (UTC).
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
