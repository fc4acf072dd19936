//! Cross-session signal delivery.
//!
//! Browsers offer two overlapping primitives for talking across tabs — a
//! low-level broadcast channel and observation of shared storage writes —
//! and either may be unavailable depending on context. [`CrossTabHub`]
//! models the shared medium; [`BroadcastChannel`] and
//! [`StorageSignalChannel`] are the two redundant transports over it.
//! Sessions attach both and rely on origin-based self-suppression to ignore
//! the duplicate deliveries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use intake_core::RefreshSignal;
use tokio::sync::broadcast;

use crate::channel::{ChannelError, NotificationChannel, CHANNEL_CAPACITY};

// ---------------------------------------------------------------------------
// CrossTabHub
// ---------------------------------------------------------------------------

/// The shared cross-session medium. One hub is shared by every session
/// (tab) of the same browser profile.
pub struct CrossTabHub {
    broadcast: broadcast::Sender<RefreshSignal>,
    storage: broadcast::Sender<RefreshSignal>,
    broadcast_available: AtomicBool,
    storage_available: AtomicBool,
}

impl CrossTabHub {
    pub fn new() -> Arc<Self> {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (storage_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            broadcast: broadcast_tx,
            storage: storage_tx,
            broadcast_available: AtomicBool::new(true),
            storage_available: AtomicBool::new(true),
        })
    }

    /// Toggle availability of the broadcast primitive (platform-dependent).
    pub fn set_broadcast_available(&self, available: bool) {
        self.broadcast_available.store(available, Ordering::SeqCst);
    }

    /// Toggle availability of the storage-write primitive.
    pub fn set_storage_available(&self, available: bool) {
        self.storage_available.store(available, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// BroadcastChannel
// ---------------------------------------------------------------------------

/// Cross-session transport over the hub's broadcast primitive.
pub struct BroadcastChannel {
    hub: Arc<CrossTabHub>,
}

impl BroadcastChannel {
    pub fn new(hub: Arc<CrossTabHub>) -> Self {
        Self { hub }
    }
}

impl NotificationChannel for BroadcastChannel {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&self, signal: &RefreshSignal) -> Result<(), ChannelError> {
        if !self.hub.broadcast_available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("broadcast primitive".into()));
        }
        let _ = self.hub.broadcast.send(signal.clone());
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RefreshSignal>> {
        if !self.hub.broadcast_available.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.hub.broadcast.subscribe())
    }
}

// ---------------------------------------------------------------------------
// StorageSignalChannel
// ---------------------------------------------------------------------------

/// Cross-session transport over observed storage writes. Functionally
/// redundant with [`BroadcastChannel`]; kept because either primitive may be
/// missing.
pub struct StorageSignalChannel {
    hub: Arc<CrossTabHub>,
}

impl StorageSignalChannel {
    pub fn new(hub: Arc<CrossTabHub>) -> Self {
        Self { hub }
    }
}

impl NotificationChannel for StorageSignalChannel {
    fn name(&self) -> &'static str {
        "storage-signal"
    }

    fn publish(&self, signal: &RefreshSignal) -> Result<(), ChannelError> {
        if !self.hub.storage_available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("storage primitive".into()));
        }
        let _ = self.hub.storage.send(signal.clone());
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RefreshSignal>> {
        if !self.hub.storage_available.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.hub.storage.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use intake_core::{OriginId, RefreshAction};

    #[tokio::test]
    async fn test_both_transports_deliver_across_sessions() {
        let hub = CrossTabHub::new();

        // Tab A publishes, tab B listens on both transports.
        let a_broadcast = BroadcastChannel::new(hub.clone());
        let a_storage = StorageSignalChannel::new(hub.clone());
        let mut b_broadcast = BroadcastChannel::new(hub.clone()).subscribe().unwrap();
        let mut b_storage = StorageSignalChannel::new(hub.clone()).subscribe().unwrap();

        let signal = RefreshSignal::new(RefreshAction::Assign, OriginId::generate());
        a_broadcast.publish(&signal).unwrap();
        a_storage.publish(&signal).unwrap();

        assert_eq!(b_broadcast.recv().await.unwrap(), signal);
        assert_eq!(b_storage.recv().await.unwrap(), signal);
    }

    #[test]
    fn test_unavailable_primitive_degrades() {
        let hub = CrossTabHub::new();
        hub.set_broadcast_available(false);

        let channel = BroadcastChannel::new(hub.clone());
        assert!(channel.subscribe().is_none());

        let signal = RefreshSignal::new(RefreshAction::Release, OriginId::generate());
        assert_matches!(channel.publish(&signal), Err(ChannelError::Unavailable(_)));

        // The redundant transport still works.
        let storage = StorageSignalChannel::new(hub);
        assert!(storage.subscribe().is_some());
        assert!(storage.publish(&signal).is_ok());
    }
}
