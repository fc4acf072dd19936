//! Fan-in refresh bus.
//!
//! Collapses events from the attached channels into a single debounced
//! "reconcile now" tick, suppressing signals this same session produced.
//! Channel failures are logged and swallowed; losing a channel costs push
//! timeliness, never correctness.

use std::sync::Arc;
use std::time::Duration;

use intake_core::{OriginId, RefreshAction, RefreshSignal};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::channel::NotificationChannel;
use crate::debounce::DebouncedTrigger;

/// Capacity of the outbound reconcile-tick channel. Ticks carry no payload
/// and coalesce upstream, so a small buffer suffices.
const TICK_CAPACITY: usize = 8;

/// One session's connection to every available notification channel.
pub struct RefreshBus {
    origin: OriginId,
    channels: Vec<Arc<dyn NotificationChannel>>,
    debounce: Arc<DebouncedTrigger>,
    cancel: CancellationToken,
}

impl RefreshBus {
    /// Connect the bus: subscribe every channel that can be subscribed,
    /// start the fan-in task, and return the bus plus the receiver on which
    /// debounced reconcile ticks arrive.
    ///
    /// Channels that fail to subscribe are logged and skipped — the bus
    /// degrades, it does not fail.
    pub fn connect(
        origin: OriginId,
        channels: Vec<Arc<dyn NotificationChannel>>,
        debounce_window: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CAPACITY);
        let cancel = CancellationToken::new();
        let debounce = Arc::new(DebouncedTrigger::new(debounce_window, tick_tx));

        let (merged_tx, merged_rx) = mpsc::channel::<RefreshSignal>(64);
        for channel in &channels {
            match channel.subscribe() {
                Some(rx) => {
                    tokio::spawn(forward(
                        channel.name(),
                        rx,
                        merged_tx.clone(),
                        cancel.clone(),
                    ));
                }
                None => {
                    tracing::warn!(
                        channel = channel.name(),
                        "Channel unavailable; continuing without it"
                    );
                }
            }
        }
        drop(merged_tx);

        tokio::spawn(fan_in(
            origin,
            Arc::clone(&debounce),
            cancel.clone(),
            merged_rx,
        ));

        let bus = Arc::new(Self {
            origin,
            channels,
            debounce,
            cancel,
        });

        (bus, tick_rx)
    }

    /// Tag an outbound signal with this session's origin and push it on
    /// every attached channel. Per-channel errors are swallowed and logged.
    pub fn publish(&self, action: RefreshAction) {
        let signal = RefreshSignal::new(action, self.origin);
        for channel in &self.channels {
            if let Err(err) = channel.publish(&signal) {
                tracing::warn!(channel = channel.name(), error = %err, "Publish failed on channel");
            }
        }
        tracing::debug!(action = ?action, origin = %self.origin, "Published refresh signal");
    }

    /// The origin token this bus stamps on outbound signals.
    pub fn origin(&self) -> OriginId {
        self.origin
    }

    /// Cancel the pending debounce ticket and every fan-in task.
    /// Idempotent; safe to call on a bus that never connected a channel.
    pub fn teardown(&self) {
        self.debounce.cancel();
        self.cancel.cancel();
    }
}

impl Drop for RefreshBus {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Per-channel forwarder into the merged inbox.
async fn forward(
    name: &'static str,
    mut rx: broadcast::Receiver<RefreshSignal>,
    merged: mpsc::Sender<RefreshSignal>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = rx.recv() => match result {
                Ok(signal) => {
                    if merged.send(signal).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // A lost hint is recovered by the next signal or poll.
                    tracing::warn!(channel = name, missed, "Channel lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Merged-inbox consumer: self-suppression, then single-slot debounce.
async fn fan_in(
    origin: OriginId,
    debounce: Arc<DebouncedTrigger>,
    cancel: CancellationToken,
    mut merged: mpsc::Receiver<RefreshSignal>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            signal = merged.recv() => match signal {
                Some(signal) => {
                    if signal.origin == origin {
                        tracing::trace!(origin = %signal.origin, "Self-originated signal suppressed");
                        continue;
                    }
                    tracing::debug!(
                        action = ?signal.action,
                        origin = %signal.origin,
                        at = %signal.timestamp,
                        "Refresh signal accepted; reconciliation scheduled"
                    );
                    debounce.arm();
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PubSubChannel;
    use crate::crosstab::{BroadcastChannel, CrossTabHub, StorageSignalChannel};

    const WINDOW: Duration = Duration::from_millis(500);

    fn session(
        hub: &Arc<CrossTabHub>,
    ) -> (Arc<RefreshBus>, mpsc::Receiver<()>) {
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(PubSubChannel::new()),
            Arc::new(BroadcastChannel::new(hub.clone())),
            Arc::new(StorageSignalChannel::new(hub.clone())),
        ];
        RefreshBus::connect(OriginId::generate(), channels, WINDOW)
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_signal_produces_one_tick() {
        let hub = CrossTabHub::new();
        let (tab_a, _a_ticks) = session(&hub);
        let (_tab_b, mut b_ticks) = session(&hub);

        tab_a.publish(RefreshAction::Assign);

        b_ticks.recv().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_signals_are_suppressed() {
        let hub = CrossTabHub::new();
        let (tab_a, mut a_ticks) = session(&hub);

        tab_a.publish(RefreshAction::Assign);
        tab_a.publish(RefreshAction::Release);

        // Give forwarders time to run, then cross the debounce window.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(a_ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_through_redundant_channels() {
        let hub = CrossTabHub::new();
        let (tab_a, _a_ticks) = session(&hub);
        let (_tab_b, mut b_ticks) = session(&hub);

        // Each publish lands on both cross-tab transports; ten publishes,
        // twenty deliveries, one debounced tick.
        for _ in 0..10 {
            tab_a.publish(RefreshAction::UnknownChange);
        }

        b_ticks.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(b_ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degrades_when_primitives_missing() {
        let hub = CrossTabHub::new();
        hub.set_broadcast_available(false);

        let (tab_a, _a_ticks) = session(&hub);
        let (_tab_b, mut b_ticks) = session(&hub);

        tab_a.publish(RefreshAction::Assign);
        b_ticks.recv().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_is_idempotent_and_stops_ticks() {
        let hub = CrossTabHub::new();
        let (tab_a, _a_ticks) = session(&hub);
        let (tab_b, mut b_ticks) = session(&hub);

        tab_b.teardown();
        tab_b.teardown();

        tab_a.publish(RefreshAction::Assign);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(b_ticks.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_teardown_without_channels_is_safe() {
        let (bus, _ticks) = RefreshBus::connect(OriginId::generate(), vec![], WINDOW);
        bus.teardown();
        bus.teardown();
    }
}
