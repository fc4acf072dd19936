//! The disposable queue projection handed to the presentation layer.
//!
//! A projection is a read-only, eventually-consistent cache of server state.
//! It is replaced wholesale on every successful reconciliation — never
//! patched incrementally — so it can never diverge from the store by way of
//! partial updates.

use serde::{Deserialize, Serialize};

use crate::types::{HolderId, RecordId, Timestamp};

// ---------------------------------------------------------------------------
// Projection rows
// ---------------------------------------------------------------------------

/// Display fields carried through from the queue data service.
///
/// Opaque pass-through: the core never interprets these, it only hands them
/// to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDisplay {
    pub name: String,
    pub status: String,
    pub case_type: String,
    pub phone: String,
}

/// One queue row: display fields plus the lease annotation the queue data
/// service embedded at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecordProjection {
    pub record_id: RecordId,
    pub display: RecordDisplay,
    pub holder_id: Option<HolderId>,
    pub acquired_at: Option<Timestamp>,
}

impl QueueRecordProjection {
    /// Whether any holder currently leases this record.
    pub fn is_leased(&self) -> bool {
        self.holder_id.is_some()
    }
}

/// One reconciled page of the queue, with aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePage {
    pub records: Vec<QueueRecordProjection>,
    pub total_count: usize,
    pub leased_count: usize,
}

impl QueuePage {
    /// Whether any record on this page carries a lease annotation.
    pub fn has_leased_records(&self) -> bool {
        self.records.iter().any(QueueRecordProjection::is_leased)
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Server-interpreted queue filters.
///
/// The core treats these as opaque: they are forwarded to the queue data
/// service and the lease store's claim-next selection, which own the actual
/// prioritization and filtering rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilters {
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub case_types: Vec<String>,
}

impl QueueFilters {
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.case_types.is_empty()
    }
}
