//! Service-boundary traits and in-memory implementations.
//!
//! The engine only ever talks to the lease store and the queue data service
//! through the traits defined here. The in-memory implementations model the
//! server-side behavior (TTL expiry, atomic claim-next, one-lease-per-holder)
//! closely enough to drive the simulator and the integration tests.

pub mod catalog;
pub mod lease_store;
pub mod queue_service;

pub use catalog::{IntakeRecord, RecordCatalog};
pub use lease_store::{InMemoryLeaseStore, LeaseStore};
pub use queue_service::{InMemoryQueueService, QueueDataService};
