use thiserror::Error;

/// Errors produced when parsing sheet text into typed values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidId { value: String, reason: &'static str },

    #[error("unknown order status: {0:?}")]
    UnknownOrderStatus(String),

    #[error("unknown booking status: {0:?}")]
    UnknownBookingStatus(String),
}
