//! Refresh bus and notification channels.
//!
//! Multiplexes several independent, unreliable notification channels into a
//! single debounced "reconcile now" trigger:
//!
//! - [`PubSubChannel`] — same-session cross-component signals.
//! - [`BroadcastChannel`] / [`StorageSignalChannel`] — two redundant
//!   cross-session primitives over a shared [`CrossTabHub`].
//! - [`ChangeFeedChannel`] — server change-feed adapter with a
//!   relevant-field pre-filter.
//! - [`RefreshBus`] — fan-in, self-suppression, single-slot trailing
//!   debounce, fan-out publish.
//! - [`DebouncedTrigger`] — the reusable single-slot deferred task.

pub mod bus;
pub mod changefeed;
pub mod channel;
pub mod crosstab;
pub mod debounce;

pub use bus::RefreshBus;
pub use changefeed::ChangeFeedChannel;
pub use channel::{ChannelError, NotificationChannel, PubSubChannel};
pub use crosstab::{BroadcastChannel, CrossTabHub, StorageSignalChannel};
pub use debounce::DebouncedTrigger;
