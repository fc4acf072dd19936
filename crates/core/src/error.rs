//! Error taxonomy for the coordination engine.
//!
//! Every external-call failure is caught at the assignment-client / view-model
//! boundary and converted into one of these kinds; nothing propagates as an
//! unclassified error. Business outcomes (`AlreadyHeld`, `NoEligibleRecord`)
//! are expected conditions surfaced as user-visible messages — they are not
//! logged at error level.

use crate::types::RecordId;

/// Classified failure kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A network-shaped failure. Retried only by the next natural
    /// reconciliation tick, never inline.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The calling holder already holds an unexpired lease elsewhere.
    /// Service-enforced one-lease-per-holder invariant; never overridden
    /// silently.
    #[error("holder already has an active assignment on {record_id}")]
    AlreadyHeld { record_id: RecordId },

    /// No unleased record matches the claim filters. Expected outcome of an
    /// empty or fully-claimed queue.
    #[error("no eligible record available to claim")]
    NoEligibleRecord,

    /// The lease store is misconfigured or entirely unreachable. The engine
    /// degrades to read-only, no-assignment mode until a health probe
    /// succeeds.
    #[error("lease store unavailable: {0}")]
    StoreUnavailable(String),

    /// A reconciliation response arrived after a newer request superseded
    /// it. Internal bookkeeping only; never surfaced to the user.
    #[error("stale reconciliation response discarded")]
    StaleResponseDiscarded,
}

impl CoreError {
    /// Expected business outcomes, shown to the user as plain messages
    /// rather than treated as faults.
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, Self::AlreadyHeld { .. } | Self::NoEligibleRecord)
    }

    /// Internal errors that must never reach the user.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::StaleResponseDiscarded)
    }
}

/// Convenience alias used across the workspace.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_business_outcome_classification() {
        assert!(CoreError::NoEligibleRecord.is_business_outcome());
        assert!(CoreError::AlreadyHeld {
            record_id: "r1".into()
        }
        .is_business_outcome());
        assert!(!CoreError::TransientNetwork("timeout".into()).is_business_outcome());
        assert!(!CoreError::StoreUnavailable("no partition".into()).is_business_outcome());
    }

    #[test]
    fn test_stale_is_internal_only() {
        assert!(CoreError::StaleResponseDiscarded.is_internal());
        assert!(!CoreError::NoEligibleRecord.is_internal());
    }

    #[test]
    fn test_messages_are_plain_language() {
        let err = CoreError::AlreadyHeld {
            record_id: "00Q1".into(),
        };
        assert_matches!(err, CoreError::AlreadyHeld { .. });
        assert!(err.to_string().contains("already has an active assignment"));
    }
}
