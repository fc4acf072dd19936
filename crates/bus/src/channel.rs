//! The polymorphic notification-channel capability.
//!
//! Every channel is best-effort: publish and subscribe may fail or be
//! unavailable, and the bus must degrade gracefully rather than propagate
//! the failure.

use intake_core::RefreshSignal;
use tokio::sync::broadcast;

/// Buffer capacity for channel fan-out. Signals are tiny hints; dropping
/// the oldest under backpressure is harmless because a single surviving
/// signal still triggers the same reconciliation.
pub(crate) const CHANNEL_CAPACITY: usize = 64;

/// A channel-level failure. Swallowed and logged by the bus, never
/// propagated to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The underlying primitive is not available in this context.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// The channel existed but delivery failed.
    #[error("channel send failed: {0}")]
    SendFailed(String),
}

/// One notification transport.
///
/// Variants in this workspace: pub/sub (same session), broadcast and
/// storage-signal (cross-session, redundant pair), change-feed (server
/// push). Each is independently optional.
pub trait NotificationChannel: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Push an outbound signal. Inbound-only channels may no-op.
    fn publish(&self, signal: &RefreshSignal) -> Result<(), ChannelError>;

    /// Open an inbound subscription, or `None` if the primitive is
    /// unavailable here.
    fn subscribe(&self) -> Option<broadcast::Receiver<RefreshSignal>>;
}

// ---------------------------------------------------------------------------
// PubSubChannel
// ---------------------------------------------------------------------------

/// In-process publish/subscribe hub for same-session, cross-component
/// signals.
pub struct PubSubChannel {
    sender: broadcast::Sender<RefreshSignal>,
}

impl PubSubChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl Default for PubSubChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationChannel for PubSubChannel {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn publish(&self, signal: &RefreshSignal) -> Result<(), ChannelError> {
        // Zero receivers is not a failure; the signal is just unheard.
        let _ = self.sender.send(signal.clone());
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RefreshSignal>> {
        Some(self.sender.subscribe())
    }
}
