//! Elapsed-hold display, derived without re-querying the lease store.
//!
//! A 1-second tick recomputes `now - acquired_at` for every leased record in
//! the current projection. The tick runs only while at least one lease is
//! visible; with none, the task parks on snapshot changes and costs nothing.
//! The timer is never the source of truth for whether a lease exists — only
//! for how long a confirmed one has been held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intake_core::{RecordId, Timestamp};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::view_model::QueueSnapshot;

/// Elapsed display per leased record, keyed by record id.
pub type ElapsedDisplay = HashMap<RecordId, String>;

/// Format a hold duration as `MM:SS`, minutes unbounded.
///
/// Negative durations clamp to `00:00` — the client and store clocks are
/// not guaranteed to agree.
pub fn format_elapsed(acquired_at: Timestamp, now: Timestamp) -> String {
    let secs = (now - acquired_at).num_seconds().max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// ---------------------------------------------------------------------------
// HoldTimer
// ---------------------------------------------------------------------------

/// Handle to the background tick task.
pub struct HoldTimer {
    display_rx: watch::Receiver<ElapsedDisplay>,
    ticking: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl HoldTimer {
    /// Spawn the timer against a snapshot feed.
    pub fn spawn(snapshot_rx: watch::Receiver<QueueSnapshot>, tick: Duration) -> Self {
        let (display_tx, display_rx) = watch::channel(ElapsedDisplay::new());
        let ticking = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        tokio::spawn(run(
            snapshot_rx,
            display_tx,
            Arc::clone(&ticking),
            cancel.clone(),
            tick,
        ));

        Self {
            display_rx,
            ticking,
            cancel,
        }
    }

    /// Watch the per-record elapsed display.
    pub fn display(&self) -> watch::Receiver<ElapsedDisplay> {
        self.display_rx.clone()
    }

    /// Whether the 1-second tick is currently running.
    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::SeqCst)
    }

    /// Stop the tick task. Idempotent.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run(
    mut snapshot_rx: watch::Receiver<QueueSnapshot>,
    display_tx: watch::Sender<ElapsedDisplay>,
    ticking: Arc<AtomicBool>,
    cancel: CancellationToken,
    tick: Duration,
) {
    loop {
        let has_leases = snapshot_rx.borrow().projection.has_leased_records();
        ticking.store(has_leases, Ordering::SeqCst);

        if has_leases {
            recompute(&snapshot_rx, &display_tx);
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshot_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(tick) => {}
            }
        } else {
            if !display_tx.borrow().is_empty() {
                display_tx.send_replace(ElapsedDisplay::new());
            }
            // Park until the projection changes; no timer is armed at all.
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshot_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
    ticking.store(false, Ordering::SeqCst);
}

fn recompute(
    snapshot_rx: &watch::Receiver<QueueSnapshot>,
    display_tx: &watch::Sender<ElapsedDisplay>,
) {
    let now = Utc::now();
    let display: ElapsedDisplay = snapshot_rx
        .borrow()
        .projection
        .records
        .iter()
        .filter_map(|record| {
            record
                .acquired_at
                .map(|at| (record.record_id.clone(), format_elapsed(at, now)))
        })
        .collect();
    display_tx.send_replace(display);
}
