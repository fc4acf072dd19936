//! Refresh signals and change-feed payloads.
//!
//! A refresh signal is an unreliable, non-authoritative hint that queue or
//! lease state may have changed. It is never applied to view state directly;
//! it only triggers a reconciliation read against the authoritative services.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{OriginId, RecordId, Timestamp};

// ---------------------------------------------------------------------------
// RefreshSignal
// ---------------------------------------------------------------------------

/// What kind of change the producer believes happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshAction {
    /// A record was claimed somewhere.
    Assign,
    /// A lease was released somewhere.
    Release,
    /// Something changed; no further detail available.
    UnknownChange,
}

/// Ephemeral cross-session notification. Not persisted.
///
/// The embedded `timestamp` is producer wall clock, advisory only — it is
/// used for debug ordering in logs and never for correctness decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSignal {
    pub action: RefreshAction,
    pub origin: OriginId,
    pub timestamp: Timestamp,
}

impl RefreshSignal {
    /// Create a signal stamped with the producer's origin and current time.
    pub fn new(action: RefreshAction, origin: OriginId) -> Self {
        Self {
            action,
            origin,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Change-feed events
// ---------------------------------------------------------------------------

/// Change kind delivered by the server change-feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Undelete,
}

/// One change record from the server change-feed subscription.
///
/// Best-effort delivery: the feed may be unavailable entirely, in which case
/// periodic reconciliation still provides eventual consistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub record_id: RecordId,
    pub change_type: ChangeType,
    /// Field names touched by an `Update`; empty for other change types.
    #[serde(default)]
    pub changed_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_kebab_case() {
        let json = serde_json::to_string(&RefreshAction::UnknownChange).unwrap();
        assert_eq!(json, r#""unknown-change""#);
        assert_eq!(
            serde_json::to_string(&RefreshAction::Assign).unwrap(),
            r#""assign""#
        );
    }

    #[test]
    fn test_signal_roundtrip() {
        let signal = RefreshSignal::new(RefreshAction::Release, OriginId::generate());
        let json = serde_json::to_string(&signal).unwrap();
        let back: RefreshSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal, back);
    }

    #[test]
    fn test_change_event_missing_fields_defaults_empty() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"record_id":"r1","change_type":"DELETE"}"#).unwrap();
        assert_eq!(event.change_type, ChangeType::Delete);
        assert!(event.changed_fields.is_empty());
    }
}
