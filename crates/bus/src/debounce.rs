//! Single-slot deferred trigger.
//!
//! One pending ticket at a time: arming an already-armed trigger is a no-op
//! (trailing coalesce), re-arming restarts the window, cancelling discards
//! the ticket. Fires exactly one message per armed window on the target
//! channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A reschedulable, non-accumulating deferred task.
pub struct DebouncedTrigger {
    delay: Duration,
    fire: mpsc::Sender<()>,
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl DebouncedTrigger {
    /// Create a trigger that sends `()` on `fire` after `delay` once armed.
    pub fn new(delay: Duration, fire: mpsc::Sender<()>) -> Self {
        Self {
            delay,
            fire,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Arm the trigger. If a ticket is already pending, do nothing — bursts
    /// coalesce into the one scheduled firing.
    pub fn arm(&self) {
        let mut slot = self.slot.lock().expect("debounce slot poisoned");
        if slot.is_some() {
            return;
        }
        *slot = Some(self.spawn_ticket());
    }

    /// Arm the trigger, restarting the window if a ticket was pending.
    pub fn rearm(&self) {
        let mut slot = self.slot.lock().expect("debounce slot poisoned");
        if let Some(token) = slot.take() {
            token.cancel();
        }
        *slot = Some(self.spawn_ticket());
    }

    /// Discard any pending ticket. Idempotent.
    pub fn cancel(&self) {
        if let Some(token) = self.slot.lock().expect("debounce slot poisoned").take() {
            token.cancel();
        }
    }

    /// Whether a ticket is currently pending.
    pub fn is_armed(&self) -> bool {
        self.slot.lock().expect("debounce slot poisoned").is_some()
    }

    fn spawn_ticket(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let delay = self.delay;
        let fire = self.fire.clone();
        let slot = Arc::clone(&self.slot);

        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Clear the slot before firing so a handler that re-arms
                    // immediately gets a fresh window.
                    slot.lock().expect("debounce slot poisoned").take();
                    if fire.send(()).await.is_err() {
                        tracing::trace!("Debounce target dropped; ticket discarded");
                    }
                }
            }
        });

        token
    }
}

impl Drop for DebouncedTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}
