//! Render-boundary facade: one tab/session of the lead queue.
//!
//! Wires bus, assignment client, view model, and hold timer together.
//! Inbound: `claim`, `release`, `set_filters`, `teardown`. Outbound: the
//! snapshot watch, the assignment watch, and the elapsed-hold display.

use std::sync::Arc;

use intake_bus::{NotificationChannel, RefreshBus};
use intake_core::{
    CoreResult, HolderId, Lease, OriginId, QueueConfig, QueueFilters, RecordId,
};
use intake_store::{LeaseStore, QueueDataService};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::assignment::AssignmentClient;
use crate::timer::{ElapsedDisplay, HoldTimer};
use crate::view_model::{QueueSnapshot, QueueViewModel};

/// External services and channels a session attaches to.
pub struct SessionServices {
    pub store: Arc<dyn LeaseStore>,
    pub queue: Arc<dyn QueueDataService>,
    pub channels: Vec<Arc<dyn NotificationChannel>>,
}

/// One user session over the shared queue.
pub struct QueueSession {
    bus: Arc<RefreshBus>,
    vm: Arc<QueueViewModel>,
    timer: HoldTimer,
    cancel: CancellationToken,
}

impl QueueSession {
    /// Connect a session: subscribe the bus, start the view model and
    /// timer, drive reconciliations from bus ticks, and run the initial
    /// reconciliation.
    pub async fn start(holder: HolderId, services: SessionServices, config: QueueConfig) -> Self {
        let origin = OriginId::generate();
        let (bus, mut ticks) =
            RefreshBus::connect(origin, services.channels, config.refresh_debounce);

        let client = AssignmentClient::new(holder, services.store.clone(), bus.clone());
        let vm = QueueViewModel::new(client, services.store, services.queue, &config);
        let timer = HoldTimer::spawn(vm.subscribe(), config.timer_tick);
        let cancel = CancellationToken::new();

        // Every debounced bus tick runs one reconciliation. Spawned per
        // tick so a slow fetch never blocks the tick stream; ordering is
        // handled by the sequence-number discard rule, not here. A slow
        // poll backstops the push channels when none are available.
        let driver_vm = Arc::clone(&vm);
        let driver_cancel = cancel.clone();
        let poll_interval = config.poll_interval;
        tokio::spawn(async move {
            let mut poll = tokio::time::interval_at(
                tokio::time::Instant::now() + poll_interval,
                poll_interval,
            );
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = driver_cancel.cancelled() => break,
                    tick = ticks.recv() => match tick {
                        Some(()) => {
                            let vm = Arc::clone(&driver_vm);
                            tokio::spawn(async move { vm.reconcile().await });
                        }
                        None => break,
                    },
                    _ = poll.tick() => {
                        let vm = Arc::clone(&driver_vm);
                        tokio::spawn(async move { vm.reconcile().await });
                    }
                }
            }
        });

        let session = Self {
            bus,
            vm,
            timer,
            cancel,
        };
        session.vm.reconcile().await;
        session
    }

    /// Claim a specific record, or the next eligible one when `None`.
    pub async fn claim(&self, target: Option<RecordId>) -> CoreResult<Lease> {
        self.vm.claim(target).await
    }

    /// Release this session's lease. Second release is a no-op success.
    pub async fn release(&self) -> CoreResult<()> {
        self.vm.release().await
    }

    /// Replace the queue filters (debounced refetch).
    pub async fn set_filters(&self, filters: QueueFilters) {
        self.vm.set_filters(filters).await
    }

    /// Current-state watch for the presentation layer.
    pub fn snapshot(&self) -> watch::Receiver<QueueSnapshot> {
        self.vm.subscribe()
    }

    /// Debounced has-assignment watch for independently mounted surfaces.
    pub fn assignment_watch(&self) -> watch::Receiver<bool> {
        self.vm.assignment_watch()
    }

    /// Per-record elapsed-hold display.
    pub fn elapsed(&self) -> watch::Receiver<ElapsedDisplay> {
        self.timer.display()
    }

    /// Whether the hold timer is actively ticking.
    pub fn timer_active(&self) -> bool {
        self.timer.is_ticking()
    }

    /// The origin token this session stamps on published signals.
    pub fn origin(&self) -> OriginId {
        self.bus.origin()
    }

    /// Tear the session down: bus, view model, timer, driver. Idempotent;
    /// safe to call more than once or on a session that never connected a
    /// channel.
    pub fn teardown(&self) {
        self.cancel.cancel();
        self.timer.teardown();
        self.vm.teardown();
        self.bus.teardown();
    }
}

impl Drop for QueueSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
