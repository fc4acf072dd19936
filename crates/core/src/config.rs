//! Engine tunables with env-var overrides.
//!
//! Defaults match the production deployment; every knob can be overridden
//! through an `INTAKE_*` environment variable (loaded via `dotenvy` by the
//! binary before this module is consulted).

use std::time::Duration;

/// Fixed lease TTL in seconds (30 minutes). The store enforces expiry; the
/// client never extends a lease implicitly.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 1800;

/// Trailing debounce applied to inbound refresh signals before a
/// reconciliation is triggered.
pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 500;

/// Debounce applied after a filter change before reconciling, so a user
/// adjusting several filter controls causes one fetch, not a storm.
pub const DEFAULT_FILTER_DEBOUNCE_MS: u64 = 300;

/// Settle delay before broadcasting an assignment-state change to
/// independently mounted surfaces.
pub const DEFAULT_ASSIGNMENT_SETTLE_MS: u64 = 100;

/// Hold-timer tick cadence.
pub const DEFAULT_TIMER_TICK_MS: u64 = 1000;

/// Fallback poll cadence. Push channels handle the common case; the poll
/// catches whatever they miss (unavailable channels, dropped signals).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Record fields whose updates are relevant to queue membership or
/// assignment display. An update-type change touching none of these must
/// not trigger a reconciliation.
pub const RELEVANT_FIELDS: &[&str] = &[
    "Status",
    "OwnerId",
    "Case_Type__c",
    "Assigned_To__c",
    "Assigned_At__c",
    "Priority_Score__c",
];

/// Returns `true` if any changed field is on the relevance allow-list.
pub fn intersects_relevant_fields(changed: &[String]) -> bool {
    changed.iter().any(|f| RELEVANT_FIELDS.contains(&f.as_str()))
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub lease_ttl: Duration,
    pub refresh_debounce: Duration,
    pub filter_debounce: Duration,
    pub assignment_settle: Duration,
    pub timer_tick: Duration,
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
            refresh_debounce: Duration::from_millis(DEFAULT_REFRESH_DEBOUNCE_MS),
            filter_debounce: Duration::from_millis(DEFAULT_FILTER_DEBOUNCE_MS),
            assignment_settle: Duration::from_millis(DEFAULT_ASSIGNMENT_SETTLE_MS),
            timer_tick: Duration::from_millis(DEFAULT_TIMER_TICK_MS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl QueueConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            lease_ttl: Duration::from_secs(env_u64("INTAKE_LEASE_TTL_SECS", DEFAULT_LEASE_TTL_SECS)),
            refresh_debounce: Duration::from_millis(env_u64(
                "INTAKE_REFRESH_DEBOUNCE_MS",
                DEFAULT_REFRESH_DEBOUNCE_MS,
            )),
            filter_debounce: Duration::from_millis(env_u64(
                "INTAKE_FILTER_DEBOUNCE_MS",
                DEFAULT_FILTER_DEBOUNCE_MS,
            )),
            assignment_settle: Duration::from_millis(env_u64(
                "INTAKE_ASSIGNMENT_SETTLE_MS",
                DEFAULT_ASSIGNMENT_SETTLE_MS,
            )),
            timer_tick: Duration::from_millis(env_u64(
                "INTAKE_TIMER_TICK_MS",
                DEFAULT_TIMER_TICK_MS,
            )),
            poll_interval: Duration::from_secs(env_u64(
                "INTAKE_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
        }
    }

    /// Lease TTL as a chrono duration, for timestamp arithmetic.
    pub fn lease_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lease_ttl).unwrap_or(chrono::Duration::MAX)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = QueueConfig::default();
        assert_eq!(config.lease_ttl, Duration::from_secs(1800));
        assert_eq!(config.refresh_debounce, Duration::from_millis(500));
        assert_eq!(config.filter_debounce, Duration::from_millis(300));
        assert_eq!(config.assignment_settle, Duration::from_millis(100));
        assert_eq!(config.timer_tick, Duration::from_millis(1000));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_relevant_field_intersection() {
        assert!(intersects_relevant_fields(&["Status".to_string()]));
        assert!(intersects_relevant_fields(&[
            "Description".to_string(),
            "OwnerId".to_string(),
        ]));
    }

    #[test]
    fn test_irrelevant_fields_do_not_intersect() {
        assert!(!intersects_relevant_fields(&[]));
        assert!(!intersects_relevant_fields(&[
            "Description".to_string(),
            "LastViewedDate".to_string(),
        ]));
    }

    #[test]
    fn test_env_u64_falls_back_on_garbage() {
        // Unset and unparseable both fall back to the default.
        assert_eq!(env_u64("INTAKE_TEST_UNSET_KNOB", 7), 7);
        std::env::set_var("INTAKE_TEST_BAD_KNOB", "not-a-number");
        assert_eq!(env_u64("INTAKE_TEST_BAD_KNOB", 9), 9);
        std::env::remove_var("INTAKE_TEST_BAD_KNOB");
    }
}
