//! Queue data service boundary and its in-memory implementation.
//!
//! The queue data service owns sorting and filtering; the engine consumes
//! the result read-only. Each page embeds lease annotations so that one
//! fetch carries everything the projection needs.

use std::sync::Arc;

use async_trait::async_trait;
use intake_core::{CoreError, CoreResult, QueueFilters, QueuePage, QueueRecordProjection};
use tokio::sync::Mutex;

use crate::catalog::RecordCatalog;
use crate::lease_store::{InMemoryLeaseStore, LeaseStore};

// ---------------------------------------------------------------------------
// QueueDataService trait
// ---------------------------------------------------------------------------

/// Paged, filtered, read-only view of the prioritized queue.
#[async_trait]
pub trait QueueDataService: Send + Sync {
    /// Fetch the current page for the given filters, records ordered by
    /// server-owned priority, lease annotations embedded per record.
    async fn fetch_page(&self, filters: &QueueFilters) -> CoreResult<QueuePage>;
}

// ---------------------------------------------------------------------------
// InMemoryQueueService
// ---------------------------------------------------------------------------

/// Joins the record catalog against the lease store at read time.
pub struct InMemoryQueueService {
    catalog: Arc<RecordCatalog>,
    leases: Arc<InMemoryLeaseStore>,
    fault: Mutex<Option<CoreError>>,
}

impl InMemoryQueueService {
    pub fn new(catalog: Arc<RecordCatalog>, leases: Arc<InMemoryLeaseStore>) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            leases,
            fault: Mutex::new(None),
        })
    }

    /// Inject (or clear) a fault returned by every subsequent fetch.
    pub async fn set_fault(&self, fault: Option<CoreError>) {
        *self.fault.lock().await = fault;
    }
}

#[async_trait]
impl QueueDataService for InMemoryQueueService {
    async fn fetch_page(&self, filters: &QueueFilters) -> CoreResult<QueuePage> {
        if let Some(err) = self.fault.lock().await.clone() {
            return Err(err);
        }

        let records = self.catalog.eligible(filters).await;
        // The queue stays viewable through a lease-store outage; rows just
        // lose their annotations until the store recovers.
        let leases = match self.leases.query_all_leases().await {
            Ok(leases) => leases,
            Err(err) => {
                tracing::warn!(error = %err, "Lease annotations unavailable for this page");
                Vec::new()
            }
        };

        let rows: Vec<QueueRecordProjection> = records
            .into_iter()
            .map(|record| {
                let lease = leases.iter().find(|l| l.record_id == record.record_id);
                QueueRecordProjection {
                    record_id: record.record_id,
                    display: record.display,
                    holder_id: lease.map(|l| l.holder_id.clone()),
                    acquired_at: lease.map(|l| l.acquired_at),
                }
            })
            .collect();

        let leased_count = rows.iter().filter(|r| r.is_leased()).count();
        Ok(QueuePage {
            total_count: rows.len(),
            leased_count,
            records: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IntakeRecord;
    use assert_matches::assert_matches;
    use intake_core::{HolderId, RecordDisplay};
    use std::time::Duration;

    async fn fixture() -> (Arc<InMemoryLeaseStore>, Arc<InMemoryQueueService>) {
        let catalog = RecordCatalog::new();
        for (id, priority) in [("r1", 3), ("r2", 2)] {
            catalog
                .upsert(IntakeRecord::new(
                    id,
                    RecordDisplay {
                        name: format!("Lead {id}"),
                        status: "New".to_string(),
                        case_type: "MVA".to_string(),
                        phone: "555-0100".to_string(),
                    },
                    priority,
                ))
                .await;
        }
        let store = InMemoryLeaseStore::new(catalog.clone(), Duration::from_secs(1800));
        let service = InMemoryQueueService::new(catalog, store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_page_embeds_lease_annotations() {
        let (store, service) = fixture().await;
        let holder: HolderId = "h1".into();
        let lease = store
            .claim_specific(&holder, &"r2".into())
            .await
            .unwrap();

        let page = service.fetch_page(&QueueFilters::default()).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.leased_count, 1);

        let annotated = page
            .records
            .iter()
            .find(|r| r.record_id == "r2".into())
            .unwrap();
        assert_eq!(annotated.holder_id, Some(holder));
        assert_eq!(annotated.acquired_at, Some(lease.acquired_at));

        let free = page
            .records
            .iter()
            .find(|r| r.record_id == "r1".into())
            .unwrap();
        assert_eq!(free.holder_id, None);
        assert_eq!(free.acquired_at, None);
    }

    #[tokio::test]
    async fn test_store_outage_leaves_queue_viewable() {
        let (store, service) = fixture().await;
        store.claim_specific(&"h1".into(), &"r1".into()).await.unwrap();
        store
            .set_fault(Some(CoreError::StoreUnavailable("partition gone".into())))
            .await;

        // Page still loads; the annotation is simply missing.
        let page = service.fetch_page(&QueueFilters::default()).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.leased_count, 0);
    }

    #[tokio::test]
    async fn test_fetch_fault_injection() {
        let (_, service) = fixture().await;
        service
            .set_fault(Some(CoreError::TransientNetwork("socket reset".into())))
            .await;
        assert_matches!(
            service.fetch_page(&QueueFilters::default()).await,
            Err(CoreError::TransientNetwork(_))
        );
    }
}
