use kemah_store::StoreError;
use kemah_types::TypeError;

/// Errors produced by ledger operations.
///
/// Domain refusals (`InvalidTransition`, `DuplicateBooking`,
/// `LotNotAssigned`, `Validation`, `InsufficientStock`, `Unavailable`) are
/// raised before anything is written. The remaining variants are
/// infrastructure faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot {edge} {id}: status is {from}")]
    InvalidTransition {
        id: String,
        from: String,
        edge: String,
    },

    #[error("{email} already holds an active booking for {event}")]
    DuplicateBooking { email: String, event: String },

    #[error("booking {0} has no lot assigned")]
    LotNotAssigned(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("only {available} of {item} in stock, {requested} requested")]
    InsufficientStock {
        item: String,
        available: u64,
        requested: u32,
    },

    #[error("{0} is no longer available")]
    Unavailable(String),

    #[error("no record {id:?} in {table}")]
    RecordNotFound { table: String, id: String },

    #[error("column {column:?} not found in {table}")]
    ColumnNotFound { table: String, column: String },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("record {id:?} is malformed: {reason}")]
    Malformed { id: String, reason: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{service} failed: {reason}")]
    Collaborator { service: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::DuplicateBooking { .. } => "duplicate_booking",
            Self::LotNotAssigned(_) => "lot_not_assigned",
            Self::Validation(_) => "validation",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::Unavailable(_) => "unavailable",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::ColumnNotFound { .. } => "column_not_found",
            Self::TableNotFound(_) => "table_not_found",
            Self::Malformed { .. } => "malformed_record",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Collaborator { .. } => "collaborator",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns `true` for refusals caused by the request or the record's
    /// current state rather than by infrastructure.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::DuplicateBooking { .. }
                | Self::LotNotAssigned(_)
                | Self::Validation(_)
                | Self::InsufficientStock { .. }
                | Self::Unavailable(_)
        )
    }

    pub(crate) fn collaborator(service: &str, reason: impl ToString) -> Self {
        Self::Collaborator {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(table) => Self::TableNotFound(table),
            StoreError::ColumnNotFound { table, column } => Self::ColumnNotFound { table, column },
            StoreError::RecordNotFound { table, id, .. } => Self::RecordNotFound { table, id },
            StoreError::Unavailable(reason) | StoreError::Decode(reason) => {
                Self::StoreUnavailable(reason)
            }
            StoreError::InvalidCell { row, column } => {
                Self::Configuration(format!("write to invalid cell row {row} column {column}"))
            }
        }
    }
}

impl From<TypeError> for LedgerError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_ledger_errors() {
        let err: LedgerError = StoreError::RecordNotFound {
            table: "Market OB".into(),
            key: "order_id".into(),
            id: "AAA".into(),
        }
        .into();
        assert_eq!(
            err,
            LedgerError::RecordNotFound {
                table: "Market OB".into(),
                id: "AAA".into()
            }
        );
        let err: LedgerError = StoreError::Unavailable("timeout".into()).into();
        assert_eq!(err.kind(), "store_unavailable");
        assert!(!err.is_domain());
    }

    #[test]
    fn domain_errors_are_flagged() {
        assert!(LedgerError::LotNotAssigned("X".into()).is_domain());
        assert!(!LedgerError::Configuration("x".into()).is_domain());
    }
}
