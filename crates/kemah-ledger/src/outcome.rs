use serde::Serialize;

/// Whether a transition changed anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The edge was taken and its side effects ran.
    Applied,
    /// The record was already in the edge's target state. Nothing was
    /// written and no side effect ran.
    AlreadyApplied,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Result of a ledger transition: the outcome plus the record as it stands
/// after the call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transition<T> {
    pub outcome: TransitionOutcome,
    pub record: T,
}

impl<T> Transition<T> {
    pub fn applied(record: T) -> Self {
        Self {
            outcome: TransitionOutcome::Applied,
            record,
        }
    }

    pub fn already_applied(record: T) -> Self {
        Self {
            outcome: TransitionOutcome::AlreadyApplied,
            record,
        }
    }
}
