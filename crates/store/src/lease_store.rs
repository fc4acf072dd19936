//! Lease store boundary and its in-memory TTL-enforcing implementation.
//!
//! The store is the sole writer of lease truth. Every call is atomic from
//! the caller's point of view; there is no transaction API beyond that.
//! Expiry happens entirely inside the store — clients only ever observe an
//! expired lease as absence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use intake_core::{CoreError, CoreResult, HolderId, Lease, QueueFilters, RecordId, Timestamp};
use tokio::sync::Mutex;

use crate::catalog::RecordCatalog;

// ---------------------------------------------------------------------------
// LeaseStore trait
// ---------------------------------------------------------------------------

/// The server-owned key-value lease cache, seen from the client side.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically select and lease the highest-priority eligible record not
    /// already leased by anyone.
    ///
    /// Fails with [`CoreError::NoEligibleRecord`] when nothing qualifies and
    /// [`CoreError::AlreadyHeld`] when the holder already has an unexpired
    /// lease elsewhere.
    async fn claim_next(&self, holder: &HolderId, filters: &QueueFilters) -> CoreResult<Lease>;

    /// Claim an explicit record, under the same one-lease-per-holder
    /// invariant.
    async fn claim_specific(&self, holder: &HolderId, record_id: &RecordId) -> CoreResult<Lease>;

    /// Release the holder's lease. Idempotent: releasing an already-absent
    /// lease is success, not an error.
    async fn release(&self, holder: &HolderId) -> CoreResult<()>;

    /// Read-only lookup of the holder's current lease.
    async fn query_holder_lease(&self, holder: &HolderId) -> CoreResult<Option<Lease>>;

    /// Read-only snapshot of every active lease.
    async fn query_all_leases(&self) -> CoreResult<Vec<Lease>>;

    /// Cheap probe used to detect recovery from a degraded store.
    async fn health_check(&self) -> CoreResult<()>;
}

// ---------------------------------------------------------------------------
// InMemoryLeaseStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreInner {
    leases: HashMap<RecordId, Lease>,
    /// When set, every operation fails with a clone of this error. Used to
    /// model outages and flaky networks.
    fault: Option<CoreError>,
}

/// TTL-enforcing in-memory lease store.
///
/// All mutation happens under one mutex, which is what makes claim-next
/// atomic. Expired leases are pruned lazily at the start of every operation.
pub struct InMemoryLeaseStore {
    catalog: Arc<RecordCatalog>,
    ttl: chrono::Duration,
    inner: Mutex<StoreInner>,
}

impl InMemoryLeaseStore {
    pub fn new(catalog: Arc<RecordCatalog>, ttl: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            inner: Mutex::new(StoreInner::default()),
        })
    }

    /// Inject (or clear) a fault returned by every subsequent operation.
    pub async fn set_fault(&self, fault: Option<CoreError>) {
        self.inner.lock().await.fault = fault;
    }

    /// Server-side forced release, as triggered by a qualifying change to
    /// the underlying record. Clients observe it exactly like expiry.
    pub async fn force_release(&self, record_id: &RecordId) {
        let mut inner = self.inner.lock().await;
        if inner.leases.remove(record_id).is_some() {
            tracing::debug!(record_id = %record_id, "Lease force-released by server");
        }
    }

    /// Backdate a lease's `acquired_at` (test/simulator hook for exercising
    /// TTL expiry without waiting).
    pub async fn backdate(&self, record_id: &RecordId, by: chrono::Duration) {
        if let Some(lease) = self.inner.lock().await.leases.get_mut(record_id) {
            lease.acquired_at -= by;
        }
    }

    fn prune_expired(&self, inner: &mut StoreInner, now: Timestamp) {
        inner
            .leases
            .retain(|_, lease| !lease.is_expired(self.ttl, now));
    }

    fn check_fault(&self, inner: &StoreInner) -> CoreResult<()> {
        match &inner.fault {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn holder_lease(inner: &StoreInner, holder: &HolderId) -> Option<Lease> {
        inner
            .leases
            .values()
            .find(|l| &l.holder_id == holder)
            .cloned()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn claim_next(&self, holder: &HolderId, filters: &QueueFilters) -> CoreResult<Lease> {
        let mut inner = self.inner.lock().await;
        self.check_fault(&inner)?;
        let now = Utc::now();
        self.prune_expired(&mut inner, now);

        if let Some(existing) = Self::holder_lease(&inner, holder) {
            return Err(CoreError::AlreadyHeld {
                record_id: existing.record_id,
            });
        }

        // Catalog read happens under the lease mutex so a record soft-deleted
        // concurrently can never be selected and leased.
        let target = self
            .catalog
            .eligible(filters)
            .await
            .into_iter()
            .find(|r| !inner.leases.contains_key(&r.record_id))
            .ok_or(CoreError::NoEligibleRecord)?;

        let lease = Lease::new(target.record_id.clone(), holder.clone(), now);
        inner.leases.insert(target.record_id, lease.clone());
        tracing::debug!(record_id = %lease.record_id, holder = %holder, "Lease claimed (next)");
        Ok(lease)
    }

    async fn claim_specific(&self, holder: &HolderId, record_id: &RecordId) -> CoreResult<Lease> {
        let mut inner = self.inner.lock().await;
        self.check_fault(&inner)?;
        let now = Utc::now();
        self.prune_expired(&mut inner, now);

        // Same ordering as claim_next: the deleted check must see the
        // catalog as it is at insert time.
        let record = self.catalog.get(record_id).await;

        if let Some(existing) = Self::holder_lease(&inner, holder) {
            if &existing.record_id == record_id {
                // Re-claiming the record you already hold is a no-op.
                return Ok(existing);
            }
            return Err(CoreError::AlreadyHeld {
                record_id: existing.record_id,
            });
        }

        // Missing, deleted, or already-leased targets are all simply not
        // claimable.
        let claimable = record.map(|r| !r.deleted).unwrap_or(false)
            && !inner.leases.contains_key(record_id);
        if !claimable {
            return Err(CoreError::NoEligibleRecord);
        }

        let lease = Lease::new(record_id.clone(), holder.clone(), now);
        inner.leases.insert(record_id.clone(), lease.clone());
        tracing::debug!(record_id = %record_id, holder = %holder, "Lease claimed (specific)");
        Ok(lease)
    }

    async fn release(&self, holder: &HolderId) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        self.check_fault(&inner)?;
        let now = Utc::now();
        self.prune_expired(&mut inner, now);

        let before = inner.leases.len();
        inner.leases.retain(|_, lease| &lease.holder_id != holder);
        if inner.leases.len() < before {
            tracing::debug!(holder = %holder, "Lease released");
        }
        Ok(())
    }

    async fn query_holder_lease(&self, holder: &HolderId) -> CoreResult<Option<Lease>> {
        let mut inner = self.inner.lock().await;
        self.check_fault(&inner)?;
        self.prune_expired(&mut inner, Utc::now());
        Ok(Self::holder_lease(&inner, holder))
    }

    async fn query_all_leases(&self) -> CoreResult<Vec<Lease>> {
        let mut inner = self.inner.lock().await;
        self.check_fault(&inner)?;
        self.prune_expired(&mut inner, Utc::now());
        Ok(inner.leases.values().cloned().collect())
    }

    async fn health_check(&self) -> CoreResult<()> {
        let inner = self.inner.lock().await;
        self.check_fault(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IntakeRecord;
    use assert_matches::assert_matches;
    use intake_core::RecordDisplay;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(1800);

    async fn seeded_store() -> (Arc<RecordCatalog>, Arc<InMemoryLeaseStore>) {
        let catalog = RecordCatalog::new();
        for (id, priority) in [("r1", 30), ("r2", 20), ("r3", 10)] {
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
        let store = InMemoryLeaseStore::new(catalog.clone(), TTL);
        (catalog, store)
    }

    #[tokio::test]
    async fn test_claim_next_takes_highest_priority() {
        let (_, store) = seeded_store().await;
        let lease = store
            .claim_next(&"h1".into(), &QueueFilters::default())
            .await
            .unwrap();
        assert_eq!(lease.record_id, "r1".into());
    }

    #[tokio::test]
    async fn test_one_lease_per_holder_enforced() {
        let (_, store) = seeded_store().await;
        let holder: HolderId = "h1".into();
        let first = store
            .claim_next(&holder, &QueueFilters::default())
            .await
            .unwrap();

        let err = store
            .claim_next(&holder, &QueueFilters::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::AlreadyHeld {
                record_id: first.record_id.clone()
            }
        );

        let err = store.claim_specific(&holder, &"r3".into()).await.unwrap_err();
        assert_matches!(err, CoreError::AlreadyHeld { .. });

        // Exactly one active lease for the holder at any instant.
        let leases = store.query_all_leases().await.unwrap();
        assert_eq!(
            leases.iter().filter(|l| l.holder_id == holder).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_claim_specific_already_held_record_is_idempotent() {
        let (_, store) = seeded_store().await;
        let holder: HolderId = "h1".into();
        let first = store.claim_specific(&holder, &"r2".into()).await.unwrap();
        let second = store.claim_specific(&holder, &"r2".into()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_claim_specific_held_by_other_is_not_eligible() {
        let (_, store) = seeded_store().await;
        store.claim_specific(&"h1".into(), &"r2".into()).await.unwrap();
        let err = store
            .claim_specific(&"h2".into(), &"r2".into())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::NoEligibleRecord);
    }

    #[tokio::test]
    async fn test_claim_next_skips_leased_records() {
        let (_, store) = seeded_store().await;
        store.claim_next(&"h1".into(), &QueueFilters::default()).await.unwrap();
        let lease = store
            .claim_next(&"h2".into(), &QueueFilters::default())
            .await
            .unwrap();
        assert_eq!(lease.record_id, "r2".into());
    }

    #[tokio::test]
    async fn test_deleted_record_is_never_leased() {
        let (catalog, store) = seeded_store().await;
        catalog.mark_deleted(&"r1".into(), true).await;

        // Claim-next selects from the catalog under the lease mutex, so the
        // freshly deleted top record is skipped, not leased.
        let lease = store
            .claim_next(&"h1".into(), &QueueFilters::default())
            .await
            .unwrap();
        assert_eq!(lease.record_id, "r2".into());

        let err = store
            .claim_specific(&"h2".into(), &"r1".into())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::NoEligibleRecord);
    }

    #[tokio::test]
    async fn test_empty_queue_yields_no_eligible_record() {
        let catalog = RecordCatalog::new();
        let store = InMemoryLeaseStore::new(catalog, TTL);
        let err = store
            .claim_next(&"h1".into(), &QueueFilters::default())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::NoEligibleRecord);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (_, store) = seeded_store().await;
        let holder: HolderId = "h1".into();
        store.claim_next(&holder, &QueueFilters::default()).await.unwrap();

        store.release(&holder).await.unwrap();
        let after_first = store.query_holder_lease(&holder).await.unwrap();

        // Second release of an absent lease is a no-op success.
        store.release(&holder).await.unwrap();
        let after_second = store.query_holder_lease(&holder).await.unwrap();

        assert_eq!(after_first, None);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_expired_lease_is_observed_as_absence() {
        let (_, store) = seeded_store().await;
        let holder: HolderId = "h1".into();
        let lease = store.claim_next(&holder, &QueueFilters::default()).await.unwrap();

        store
            .backdate(&lease.record_id, chrono::Duration::seconds(1801))
            .await;

        assert_eq!(store.query_holder_lease(&holder).await.unwrap(), None);
        // The record is claimable again, by anyone.
        let reclaim = store.claim_specific(&"h2".into(), &lease.record_id).await;
        assert!(reclaim.is_ok());
    }

    #[tokio::test]
    async fn test_force_release_frees_the_record() {
        let (_, store) = seeded_store().await;
        let lease = store
            .claim_next(&"h1".into(), &QueueFilters::default())
            .await
            .unwrap();
        store.force_release(&lease.record_id).await;
        assert_eq!(store.query_holder_lease(&"h1".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fault_injection_fails_every_operation() {
        let (_, store) = seeded_store().await;
        store
            .set_fault(Some(CoreError::StoreUnavailable("partition gone".into())))
            .await;

        assert_matches!(
            store.claim_next(&"h1".into(), &QueueFilters::default()).await,
            Err(CoreError::StoreUnavailable(_))
        );
        assert_matches!(
            store.health_check().await,
            Err(CoreError::StoreUnavailable(_))
        );

        store.set_fault(None).await;
        assert!(store.health_check().await.is_ok());
    }
}
