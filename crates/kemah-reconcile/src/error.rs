use kemah_ledger::LedgerError;

/// Errors that make the gateway retry its notification.
///
/// Domain refusals are not errors here; they come back as
/// [`Reconciliation::Rejected`](crate::Reconciliation::Rejected).
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The notification's signature does not match the configured server key.
    #[error("invalid signature for notification {0}")]
    InvalidSignature(String),

    /// The notification could not be decoded.
    #[error("malformed notification: {0}")]
    Malformed(String),

    /// The store or a collaborator failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSignature(_) => "invalid_signature",
            Self::Malformed(_) => "malformed_notification",
            Self::Ledger(err) => err.kind(),
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
