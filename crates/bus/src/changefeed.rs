//! Server change-feed adapter.
//!
//! Translates structured change records into refresh signals, pre-filtered
//! so that high-frequency edits to irrelevant fields never reach the bus:
//! delete/undelete (and create) always pass, updates pass only when the
//! changed-field set intersects the relevance allow-list.

use intake_core::config::intersects_relevant_fields;
use intake_core::{ChangeEvent, ChangeType, OriginId, RefreshAction, RefreshSignal};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelError, NotificationChannel, CHANNEL_CAPACITY};

/// Adapts a stream of [`ChangeEvent`]s into refresh signals.
///
/// The adapter owns a distinct random origin so feed-driven signals can
/// never be mistaken for a session's own publishes. Inbound-only: the
/// client cannot write into the server feed, so `publish` is a no-op.
/// Dropping the channel stops the adapter task and releases its feed
/// subscription.
pub struct ChangeFeedChannel {
    origin: OriginId,
    out: broadcast::Sender<RefreshSignal>,
    cancel: CancellationToken,
}

impl ChangeFeedChannel {
    /// Attach to a change-feed subscription. When the feed cannot be
    /// subscribed at all, callers simply omit this channel and lose push
    /// timeliness only.
    pub fn connect(feed: broadcast::Receiver<ChangeEvent>) -> Self {
        let (out, _) = broadcast::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let channel = Self {
            origin: OriginId::generate(),
            out: out.clone(),
            cancel: cancel.clone(),
        };

        let origin = channel.origin;
        let mut feed = feed;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Change-feed channel dropped; adapter exiting");
                        break;
                    }
                    event = feed.recv() => match event {
                        Ok(event) => {
                            if let Some(signal) = translate(&event, origin) {
                                // Zero receivers just means nobody is listening yet.
                                let _ = out.send(signal);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Change feed lagged; continuing");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Change feed closed; adapter exiting");
                            break;
                        }
                    },
                }
            }
        });

        channel
    }
}

impl Drop for ChangeFeedChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pre-filter and translate one change record.
///
/// Returns `None` for updates whose changed fields are disjoint from the
/// allow-list — those must produce zero reconciliations downstream.
fn translate(event: &ChangeEvent, origin: OriginId) -> Option<RefreshSignal> {
    let relevant = match event.change_type {
        ChangeType::Delete | ChangeType::Undelete | ChangeType::Create => true,
        ChangeType::Update => intersects_relevant_fields(&event.changed_fields),
    };
    if !relevant {
        tracing::trace!(
            record_id = %event.record_id,
            "Ignoring change to irrelevant fields"
        );
        return None;
    }
    Some(RefreshSignal::new(RefreshAction::UnknownChange, origin))
}

impl NotificationChannel for ChangeFeedChannel {
    fn name(&self) -> &'static str {
        "change-feed"
    }

    fn publish(&self, _signal: &RefreshSignal) -> Result<(), ChannelError> {
        // The feed is server-push only.
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RefreshSignal>> {
        Some(self.out.subscribe())
    }
}
