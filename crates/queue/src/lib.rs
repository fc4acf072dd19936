//! Assignment coordination engine.
//!
//! - [`assignment`] — the idempotent claim/release wrapper over the lease
//!   store, publishing refresh signals on success.
//! - [`view_model`] — per-session projection state machine with
//!   latest-wins reconciliation.
//! - [`timer`] — elapsed-hold display derived from lease timestamps.
//! - [`session`] — the render-boundary facade wiring the pieces together.

pub mod assignment;
pub mod session;
pub mod timer;
pub mod view_model;

pub use assignment::AssignmentClient;
pub use session::{QueueSession, SessionServices};
pub use timer::{format_elapsed, HoldTimer};
pub use view_model::{LoadState, QueueSnapshot, QueueViewModel};
