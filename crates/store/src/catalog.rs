//! Shared record catalog backing the in-memory services.
//!
//! Prioritization is server-owned: the catalog carries an opaque priority
//! score per record and orders by it. Nothing in the engine interprets the
//! score.

use std::collections::HashMap;
use std::sync::Arc;

use intake_core::{QueueFilters, RecordDisplay, RecordId};
use tokio::sync::RwLock;

/// One intake record as the server sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRecord {
    pub record_id: RecordId,
    pub display: RecordDisplay,
    /// Server-computed priority score; higher claims first.
    pub priority: i64,
    /// Soft-deleted records drop out of the queue but can be undeleted.
    pub deleted: bool,
}

impl IntakeRecord {
    pub fn new(record_id: impl Into<RecordId>, display: RecordDisplay, priority: i64) -> Self {
        Self {
            record_id: record_id.into(),
            display,
            priority,
            deleted: false,
        }
    }
}

/// Thread-safe record table shared by the lease store and queue service.
#[derive(Debug, Default)]
pub struct RecordCatalog {
    records: RwLock<HashMap<RecordId, IntakeRecord>>,
}

impl RecordCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: IntakeRecord) {
        self.records
            .write()
            .await
            .insert(record.record_id.clone(), record);
    }

    /// Soft-delete a record (it leaves the queue until undeleted).
    pub async fn mark_deleted(&self, record_id: &RecordId, deleted: bool) {
        if let Some(record) = self.records.write().await.get_mut(record_id) {
            record.deleted = deleted;
        }
    }

    pub async fn get(&self, record_id: &RecordId) -> Option<IntakeRecord> {
        self.records.read().await.get(record_id).cloned()
    }

    /// All live records matching the filters, ordered by descending
    /// priority (record id as a stable tiebreak).
    pub async fn eligible(&self, filters: &QueueFilters) -> Vec<IntakeRecord> {
        let mut matches: Vec<IntakeRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| !r.deleted && filters_match(filters, r))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        matches
    }
}

fn filters_match(filters: &QueueFilters, record: &IntakeRecord) -> bool {
    let status_ok =
        filters.statuses.is_empty() || filters.statuses.contains(&record.display.status);
    let case_ok =
        filters.case_types.is_empty() || filters.case_types.contains(&record.display.case_type);
    status_ok && case_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: &str, case_type: &str, priority: i64) -> IntakeRecord {
        IntakeRecord {
            record_id: id.into(),
            display: RecordDisplay {
                name: format!("Lead {id}"),
                status: status.to_string(),
                case_type: case_type.to_string(),
                phone: "555-0100".to_string(),
            },
            priority,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn test_eligible_orders_by_priority_desc() {
        let catalog = RecordCatalog::new();
        catalog.upsert(record("r1", "New", "MVA", 10)).await;
        catalog.upsert(record("r2", "New", "MVA", 30)).await;
        catalog.upsert(record("r3", "New", "MVA", 20)).await;

        let ids: Vec<String> = catalog
            .eligible(&QueueFilters::default())
            .await
            .into_iter()
            .map(|r| r.record_id.to_string())
            .collect();
        assert_eq!(ids, vec!["r2", "r3", "r1"]);
    }

    #[tokio::test]
    async fn test_filters_narrow_by_status_and_case_type() {
        let catalog = RecordCatalog::new();
        catalog.upsert(record("r1", "New", "MVA", 1)).await;
        catalog.upsert(record("r2", "Contacted", "MVA", 2)).await;
        catalog.upsert(record("r3", "New", "WorkComp", 3)).await;

        let filters = QueueFilters {
            statuses: vec!["New".to_string()],
            case_types: vec!["MVA".to_string()],
        };
        let matches = catalog.eligible(&filters).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record_id, "r1".into());
    }

    #[tokio::test]
    async fn test_deleted_records_are_not_eligible() {
        let catalog = RecordCatalog::new();
        catalog.upsert(record("r1", "New", "MVA", 1)).await;
        catalog.mark_deleted(&"r1".into(), true).await;
        assert!(catalog.eligible(&QueueFilters::default()).await.is_empty());

        catalog.mark_deleted(&"r1".into(), false).await;
        assert_eq!(catalog.eligible(&QueueFilters::default()).await.len(), 1);
    }
}
