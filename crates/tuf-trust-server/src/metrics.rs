//! A minimal in-process counter registry (spec §9: "the in-process key cache and the metrics
//! registry are process-scoped singletons with defined init at server start and release at
//! shutdown"). Not wired to an external exporter (out of scope per spec.md §1's non-goals
//! around observability plumbing beyond structured logging).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the handful of events worth observing without a real metrics backend.
///
/// Constructed once in `main()` and threaded through as an `Arc` handle, never a global, so
/// tests can build an isolated `TrustServer` with a fresh registry (spec §9).
#[derive(Default)]
pub struct MetricsRegistry {
    updates_succeeded: AtomicU64,
    updates_rejected: AtomicU64,
    version_conflicts: AtomicU64,
    deletions: AtomicU64,
    key_rotations: AtomicU64,
    signer_unavailable: AtomicU64,
}

impl MetricsRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a successful atomic update.
    pub fn record_update_succeeded(&self) {
        self.updates_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an atomic update rejected by validation or the store.
    pub fn record_update_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a version-conflict rejection specifically, since it is the one rejection class
    /// callers are expected to retry after (spec §7 propagation policy).
    pub fn record_version_conflict(&self) {
        self.version_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a GUN deletion.
    pub fn record_deletion(&self) {
        self.deletions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful key rotation.
    pub fn record_key_rotation(&self) {
        self.key_rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a server-generated snapshot/timestamp rejected because the signer was unreachable.
    pub fn record_signer_unavailable(&self) {
        self.signer_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// A snapshot of all counters, for tests and the `/_internal/health` handler.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_succeeded: self.updates_succeeded.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            key_rotations: self.key_rotations.load(Ordering::Relaxed),
            signer_unavailable: self.signer_unavailable.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of [`MetricsRegistry`]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize)]
pub struct MetricsSnapshot {
    pub updates_succeeded: u64,
    pub updates_rejected: u64,
    pub version_conflicts: u64,
    pub deletions: u64,
    pub key_rotations: u64,
    pub signer_unavailable: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment_independently() {
        let registry = MetricsRegistry::new();
        registry.record_update_succeeded();
        registry.record_update_succeeded();
        registry.record_version_conflict();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.updates_succeeded, 2);
        assert_eq!(snapshot.version_conflicts, 1);
        assert_eq!(snapshot.deletions, 0);
    }
}
