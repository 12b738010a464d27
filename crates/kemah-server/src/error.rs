use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kemah_ledger::LedgerError;
use kemah_reconcile::ReconcileError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<kemah_store::StoreError> for ServerError {
    fn from(err: kemah_store::StoreError) -> Self {
        Self::Ledger(err.into())
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InvalidTransition { .. }
        | LedgerError::DuplicateBooking { .. }
        | LedgerError::LotNotAssigned(_)
        | LedgerError::InsufficientStock { .. } => StatusCode::CONFLICT,
        LedgerError::Unavailable(_) => StatusCode::GONE,
        LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
        LedgerError::ColumnNotFound { .. }
        | LedgerError::TableNotFound(_)
        | LedgerError::Malformed { .. }
        | LedgerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(err) => ledger_status(err),
            Self::Reconcile(ReconcileError::InvalidSignature(_)) => StatusCode::UNAUTHORIZED,
            Self::Reconcile(ReconcileError::Malformed(_)) => StatusCode::BAD_REQUEST,
            Self::Reconcile(ReconcileError::Ledger(err)) => ledger_status(err),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
            Self::Ledger(err) => err.kind(),
            Self::Reconcile(err) => err.kind(),
            Self::Config(_) => "configuration",
            Self::Io(_) | Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request refused");
        }
        let body = json!({ "error": self.kind(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(err: LedgerError) -> StatusCode {
        ServerError::from(err).status_code()
    }

    #[test]
    fn domain_refusals_are_client_errors() {
        let transition = LedgerError::InvalidTransition {
            id: "AB12CD34".into(),
            from: "Cancelled".into(),
            edge: "mark_paid".into(),
        };
        assert_eq!(ledger(transition), StatusCode::CONFLICT);
        assert_eq!(
            ledger(LedgerError::DuplicateBooking {
                email: "a@b".into(),
                event: "Kemah".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(ledger(LedgerError::LotNotAssigned("X".into())), StatusCode::CONFLICT);
        assert_eq!(ledger(LedgerError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            ledger(LedgerError::InsufficientStock {
                item: "Tenda".into(),
                available: 1,
                requested: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(ledger(LedgerError::Unavailable("Tenda".into())), StatusCode::GONE);
        assert_eq!(
            ledger(LedgerError::RecordNotFound {
                table: "Market OB".into(),
                id: "X".into()
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn infrastructure_faults_are_server_errors() {
        assert_eq!(ledger(LedgerError::StoreUnavailable("down".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ledger(LedgerError::TableNotFound("Events".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ledger(LedgerError::ColumnNotFound {
                table: "Events".into(),
                column: "Status".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ledger(LedgerError::Configuration("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ServerError::from(ReconcileError::InvalidSignature("X".into())).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::from(ReconcileError::Ledger(LedgerError::StoreUnavailable("x".into()))).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(ServerError::Forbidden("x".into()).kind(), "forbidden");
        assert_eq!(ServerError::from(LedgerError::LotNotAssigned("X".into())).kind(), "lot_not_assigned");
    }
}
