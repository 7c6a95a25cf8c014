//! Per-(gun, role) stripe locking (spec §5: "Implementations MAY lock per (GUN, role) for the
//! critical section of `UpdateCurrent`/`UpdateMany` if the backend lacks conditional writes").

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of mutexes keyed by an arbitrary serialization key, used to make the
/// read-current/compare/write sequence of `UpdateCurrent`/`UpdateMany` atomic with respect to
/// other writers targeting the same key. Disjoint keys never block each other.
#[derive(Default)]
pub struct StripeLock {
    stripes: DashMap<String, Arc<Mutex<()>>>,
}

impl StripeLock {
    /// Construct an empty stripe lock.
    pub fn new() -> Self {
        StripeLock {
            stripes: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, creating its stripe on first use. The returned guard releases
    /// the stripe when dropped; it is never held across an `.await` boundary longer than the
    /// critical section that calls this method.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .stripes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// The stripe key for a (gun, role) pair.
pub fn gun_role_key(gun: &str, role: &str) -> String {
    format!("{}\u{0}{}", gun, role)
}

/// The stripe key for a whole-GUN operation (e.g. `Delete`), which must not interleave with any
/// per-role write for the same GUN.
pub fn gun_key(gun: &str) -> String {
    format!("{}\u{0}", gun)
}
