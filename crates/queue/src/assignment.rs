//! Assignment client: claim/release/query against the lease store.
//!
//! A thin, retry-free wrapper. The store is authoritative; this layer never
//! remembers a lease across a failure. Its one side effect: every successful
//! claim or release publishes a refresh signal so other sessions reconcile
//! promptly — which is also the only thing that makes the bus's
//! self-suppression meaningful.

use std::sync::Arc;

use intake_bus::RefreshBus;
use intake_core::{CoreResult, HolderId, Lease, QueueFilters, RecordId, RefreshAction};
use intake_store::LeaseStore;

pub struct AssignmentClient {
    holder: HolderId,
    store: Arc<dyn LeaseStore>,
    bus: Arc<RefreshBus>,
}

impl AssignmentClient {
    pub fn new(holder: HolderId, store: Arc<dyn LeaseStore>, bus: Arc<RefreshBus>) -> Self {
        Self { holder, store, bus }
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    /// Claim the highest-priority eligible record not leased by anyone.
    pub async fn claim_next(&self, filters: &QueueFilters) -> CoreResult<Lease> {
        let result = self.store.claim_next(&self.holder, filters).await;
        self.after_mutation("claim_next", result.clone().map(Some), RefreshAction::Assign);
        result
    }

    /// Claim an explicit record under the same invariants.
    pub async fn claim_specific(&self, record_id: &RecordId) -> CoreResult<Lease> {
        let result = self.store.claim_specific(&self.holder, record_id).await;
        self.after_mutation(
            "claim_specific",
            result.clone().map(Some),
            RefreshAction::Assign,
        );
        result
    }

    /// Release this holder's lease. Releasing an absent lease is success.
    pub async fn release(&self) -> CoreResult<()> {
        let result = self.store.release(&self.holder).await;
        self.after_mutation("release", result.clone().map(|_| None), RefreshAction::Release);
        result
    }

    /// Read-only lease lookup used by reconciliation. Never mutates, never
    /// publishes.
    pub async fn query_holder_lease(&self) -> CoreResult<Option<Lease>> {
        self.store.query_holder_lease(&self.holder).await
    }

    fn after_mutation(
        &self,
        op: &'static str,
        result: CoreResult<Option<Lease>>,
        action: RefreshAction,
    ) {
        match result {
            Ok(lease) => {
                if let Some(lease) = lease {
                    tracing::info!(op, record_id = %lease.record_id, holder = %self.holder, "Assignment mutation succeeded");
                } else {
                    tracing::info!(op, holder = %self.holder, "Assignment mutation succeeded");
                }
                self.bus.publish(action);
            }
            Err(err) if err.is_business_outcome() => {
                // Expected outcome; the caller shows the message to the user.
                tracing::debug!(op, outcome = %err, "Assignment not possible");
            }
            Err(err) => {
                tracing::warn!(op, error = %err, "Assignment mutation failed");
            }
        }
    }
}
