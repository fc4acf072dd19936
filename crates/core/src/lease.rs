//! Lease record and TTL semantics.
//!
//! A lease is a time-bounded exclusive claim on one record by one holder.
//! The lease store is the sole writer of lease truth; everything in this
//! module is a read-side view of what the store reported.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{HolderId, RecordId, Timestamp};

/// One user's hold on one record.
///
/// `acquired_at` is set at claim time and immutable for the life of the
/// lease. Expiry is derived (`acquired_at + ttl`) and enforced entirely by
/// the store; the client never extends a lease implicitly. A server-forced
/// release is indistinguishable from expiry on this side — the lease is
/// simply absent on the next reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub record_id: RecordId,
    pub holder_id: HolderId,
    pub acquired_at: Timestamp,
}

impl Lease {
    pub fn new(record_id: RecordId, holder_id: HolderId, acquired_at: Timestamp) -> Self {
        Self {
            record_id,
            holder_id,
            acquired_at,
        }
    }

    /// Derived expiry instant for a given TTL.
    pub fn expires_at(&self, ttl: Duration) -> Timestamp {
        self.acquired_at + ttl
    }

    /// Whether the lease has expired at `now` for the given TTL.
    pub fn is_expired(&self, ttl: Duration, now: Timestamp) -> bool {
        now >= self.expires_at(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_is_acquired_plus_ttl() {
        let lease = Lease::new("r1".into(), "h1".into(), t0());
        let ttl = Duration::seconds(1800);
        assert_eq!(lease.expires_at(ttl), t0() + ttl);
    }

    #[test]
    fn test_not_expired_before_ttl_elapses() {
        let lease = Lease::new("r1".into(), "h1".into(), t0());
        let ttl = Duration::seconds(1800);
        assert!(!lease.is_expired(ttl, t0() + Duration::seconds(1799)));
    }

    #[test]
    fn test_expired_at_exact_ttl_boundary() {
        let lease = Lease::new("r1".into(), "h1".into(), t0());
        let ttl = Duration::seconds(1800);
        assert!(lease.is_expired(ttl, t0() + ttl));
    }
}
