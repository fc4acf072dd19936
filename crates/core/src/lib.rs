//! Shared types for the intake lead-queue coordination engine.
//!
//! This crate is the dependency root of the workspace (zero internal deps)
//! and defines:
//!
//! - [`types`] — id newtypes and the canonical timestamp alias.
//! - [`lease`] — the [`Lease`] record and TTL semantics.
//! - [`signal`] — [`RefreshSignal`] and change-feed [`ChangeEvent`] payloads.
//! - [`projection`] — the disposable queue projection handed to the
//!   presentation layer.
//! - [`error`] — the [`CoreError`] taxonomy every service boundary maps into.
//! - [`config`] — tunables with env overrides.

pub mod config;
pub mod error;
pub mod lease;
pub mod projection;
pub mod signal;
pub mod types;

pub use config::QueueConfig;
pub use error::{CoreError, CoreResult};
pub use lease::Lease;
pub use projection::{QueueFilters, QueuePage, QueueRecordProjection, RecordDisplay};
pub use signal::{ChangeEvent, ChangeType, RefreshAction, RefreshSignal};
pub use types::{HolderId, OriginId, RecordId, Timestamp};
