//! Per-session queue projection and reconciliation state machine.
//!
//! State machine: `Idle -> Loading -> {Ready, Error}`, with
//! `Ready -> Loading` on every reconciliation trigger. Responses are applied
//! latest-wins: each request carries a monotonically increasing sequence
//! number and a response lands only while its number is still the newest
//! issued. The projection is replaced wholesale on every successful
//! reconciliation, never patched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use intake_bus::DebouncedTrigger;
use intake_core::{
    CoreError, CoreResult, Lease, QueueConfig, QueueFilters, QueuePage, RecordId,
};
use intake_store::{LeaseStore, QueueDataService};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::assignment::AssignmentClient;

// ---------------------------------------------------------------------------
// Snapshot types (render boundary)
// ---------------------------------------------------------------------------

/// Load phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Everything the presentation layer needs, published as one unit.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub projection: QueuePage,
    pub holder_lease: Option<Lease>,
    pub load_state: LoadState,
    /// Last user-relevant failure; cleared by the next successful
    /// reconciliation. Internal kinds never appear here.
    pub error_state: Option<CoreError>,
    /// Read-only, no-assignment mode: the lease store is unreachable and a
    /// persistent warning should show until a health probe succeeds.
    pub store_degraded: bool,
}

impl QueueSnapshot {
    fn initial() -> Self {
        Self {
            projection: QueuePage::default(),
            holder_lease: None,
            load_state: LoadState::Idle,
            error_state: None,
            store_degraded: false,
        }
    }

    /// Derived: does this session's holder currently have an assignment?
    pub fn has_assignment(&self) -> bool {
        self.holder_lease.is_some()
    }
}

// ---------------------------------------------------------------------------
// QueueViewModel
// ---------------------------------------------------------------------------

struct VmState {
    snapshot: QueueSnapshot,
    filters: QueueFilters,
    /// Last assignment-state value actually broadcast to dependent
    /// surfaces; the settle debounce compares against this.
    notified_assignment: bool,
}

pub struct QueueViewModel {
    client: AssignmentClient,
    store: Arc<dyn LeaseStore>,
    queue: Arc<dyn QueueDataService>,
    state: Mutex<VmState>,
    /// Newest issued reconciliation sequence number. Responses for any
    /// older number are discarded.
    issued_seq: AtomicU64,
    snapshot_tx: watch::Sender<QueueSnapshot>,
    assignment_tx: watch::Sender<bool>,
    settle: DebouncedTrigger,
    filter_trigger: DebouncedTrigger,
    cancel: CancellationToken,
}

impl QueueViewModel {
    pub fn new(
        client: AssignmentClient,
        store: Arc<dyn LeaseStore>,
        queue: Arc<dyn QueueDataService>,
        config: &QueueConfig,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(QueueSnapshot::initial());
        let (assignment_tx, _) = watch::channel(false);
        let (settle_tx, settle_rx) = mpsc::channel(4);
        let (filter_tx, filter_rx) = mpsc::channel(4);

        let vm = Arc::new(Self {
            client,
            store,
            queue,
            state: Mutex::new(VmState {
                snapshot: QueueSnapshot::initial(),
                filters: QueueFilters::default(),
                notified_assignment: false,
            }),
            issued_seq: AtomicU64::new(0),
            snapshot_tx,
            assignment_tx,
            settle: DebouncedTrigger::new(config.assignment_settle, settle_tx),
            filter_trigger: DebouncedTrigger::new(config.filter_debounce, filter_tx),
            cancel: CancellationToken::new(),
        });

        tokio::spawn(settle_loop(Arc::downgrade(&vm), settle_rx));
        tokio::spawn(filter_loop(Arc::downgrade(&vm), filter_rx));

        vm
    }

    /// Watch the full snapshot (projection, lease, load/error state).
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Watch the debounced has-assignment boolean. Exists for surfaces
    /// mounted independently of the queue view (e.g. the record-detail
    /// claim button) that must agree on assignment state.
    pub fn assignment_watch(&self) -> watch::Receiver<bool> {
        self.assignment_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Run one reconciliation: fetch queue page and holder lease, then
    /// apply both together if this request is still the newest.
    pub async fn reconcile(&self) {
        let ticket = self.issue_ticket();
        let (filters, was_degraded) = {
            let mut state = self.state.lock().await;
            state.snapshot.load_state = LoadState::Loading;
            self.push(&mut state);
            (state.filters.clone(), state.snapshot.store_degraded)
        };

        let outcome = self.fetch(&filters, was_degraded).await;
        self.complete(ticket, outcome).await;
    }

    /// Reserve the next sequence number, superseding any in-flight request.
    pub(crate) fn issue_ticket(&self) -> u64 {
        self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Both round-trips of a reconciliation, treated as logically atomic:
    /// the caller renders both results together or neither.
    async fn fetch(
        &self,
        filters: &QueueFilters,
        was_degraded: bool,
    ) -> CoreResult<(QueuePage, Option<Lease>, bool)> {
        if was_degraded {
            // Probe before touching lease state again; while unhealthy the
            // queue itself stays viewable.
            if let Err(err) = self.store.health_check().await {
                tracing::warn!(error = %err, "Lease store still unhealthy; staying read-only");
                let page = self.queue.fetch_page(filters).await?;
                return Ok((page, None, true));
            }
            tracing::info!("Lease store health probe succeeded; leaving read-only mode");
        }

        let page = self.queue.fetch_page(filters).await?;
        match self.client.query_holder_lease().await {
            Ok(lease) => Ok((page, lease, false)),
            Err(CoreError::StoreUnavailable(reason)) => {
                tracing::warn!(%reason, "Lease store unavailable; entering read-only mode");
                Ok((page, None, true))
            }
            Err(err) => Err(err),
        }
    }

    /// Apply a reconciliation outcome, unless a newer request superseded it.
    pub(crate) async fn complete(
        &self,
        ticket: u64,
        outcome: CoreResult<(QueuePage, Option<Lease>, bool)>,
    ) {
        let mut state = self.state.lock().await;
        let newest = self.issued_seq.load(Ordering::SeqCst);
        if ticket != newest {
            // Internal only; the user never sees this.
            tracing::debug!(
                ticket,
                newest,
                "{}",
                CoreError::StaleResponseDiscarded
            );
            return;
        }

        match outcome {
            Ok((page, lease, degraded)) => {
                state.snapshot.projection = page;
                state.snapshot.holder_lease = lease;
                state.snapshot.load_state = LoadState::Ready;
                state.snapshot.error_state = None;
                state.snapshot.store_degraded = degraded;

                if state.snapshot.has_assignment() != state.notified_assignment {
                    self.settle.rearm();
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Reconciliation failed");
                if matches!(err, CoreError::StoreUnavailable(_)) {
                    state.snapshot.store_degraded = true;
                }
                state.snapshot.load_state = LoadState::Error;
                state.snapshot.error_state = Some(err);
            }
        }
        self.push(&mut state);
    }

    fn push(&self, state: &mut VmState) {
        self.snapshot_tx.send_replace(state.snapshot.clone());
    }

    // -----------------------------------------------------------------------
    // Inbound API (render boundary)
    // -----------------------------------------------------------------------

    /// Claim a specific record, or the next eligible one when `target` is
    /// `None`. Rejected locally while the store is degraded.
    pub async fn claim(&self, target: Option<RecordId>) -> CoreResult<Lease> {
        self.ensure_store_usable().await?;

        let result = match &target {
            Some(record_id) => self.client.claim_specific(record_id).await,
            None => self.client.claim_next(&self.current_filters().await).await,
        };

        self.after_mutation(&result.clone().map(|_| ())).await;
        result
    }

    /// Release this holder's lease (no-op success when absent).
    pub async fn release(&self) -> CoreResult<()> {
        self.ensure_store_usable().await?;
        let result = self.client.release().await;
        self.after_mutation(&result).await;
        result
    }

    /// Replace the active filters. Invalidates in-flight reconciliations
    /// and schedules a debounced refetch so rapid filter adjustments cost
    /// one round-trip, not one per control.
    pub async fn set_filters(&self, filters: QueueFilters) {
        {
            let mut state = self.state.lock().await;
            if state.filters == filters {
                return;
            }
            state.filters = filters;
        }
        // Supersede anything in flight for the old filters.
        self.issue_ticket();
        self.filter_trigger.rearm();
    }

    /// Stop internal tasks and discard pending debounce tickets.
    /// Idempotent.
    pub fn teardown(&self) {
        self.settle.cancel();
        self.filter_trigger.cancel();
        self.cancel.cancel();
    }

    async fn current_filters(&self) -> QueueFilters {
        self.state.lock().await.filters.clone()
    }

    async fn ensure_store_usable(&self) -> CoreResult<()> {
        let state = self.state.lock().await;
        if state.snapshot.store_degraded {
            return Err(CoreError::StoreUnavailable(
                "assignments disabled in read-only mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Local mutations reconcile immediately; mutation failures that imply
    /// an unreachable store flip the degraded flag right away.
    async fn after_mutation(&self, result: &CoreResult<()>) {
        match result {
            Ok(()) => self.reconcile().await,
            Err(CoreError::StoreUnavailable(_)) => {
                let mut state = self.state.lock().await;
                state.snapshot.store_degraded = true;
                self.push(&mut state);
            }
            Err(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Internal loops
// ---------------------------------------------------------------------------

/// Broadcasts the settled assignment-state boolean once the debounce window
/// closes, if it still differs from the last value broadcast.
async fn settle_loop(vm: Weak<QueueViewModel>, mut fired: mpsc::Receiver<()>) {
    while let Some(()) = fired.recv().await {
        let Some(vm) = vm.upgrade() else { break };
        if vm.cancel.is_cancelled() {
            break;
        }

        let mut state = vm.state.lock().await;
        let current = state.snapshot.has_assignment();
        if current != state.notified_assignment {
            state.notified_assignment = current;
            vm.assignment_tx.send_replace(current);
            tracing::debug!(has_assignment = current, "Assignment state change broadcast");
        }
    }
}

/// Runs the debounced reconciliation after a filter change.
async fn filter_loop(vm: Weak<QueueViewModel>, mut fired: mpsc::Receiver<()>) {
    while let Some(()) = fired.recv().await {
        let Some(vm) = vm.upgrade() else { break };
        if vm.cancel.is_cancelled() {
            break;
        }
        vm.reconcile().await;
    }
}
