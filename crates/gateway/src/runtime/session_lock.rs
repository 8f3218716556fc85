//! Per-session concurrency control.
//!
//! At most `max_permits` runs may be in flight per session at a time —
//! normally 1, unless `run.allow_concurrent_runs_per_session` is set, in
//! which case the map is constructed with an effectively unbounded
//! permit count. A session whose permits are exhausted is rejected
//! outright rather than queued — interleaving two runs onto one track
//! would violate the framing invariants, so there is nothing useful to
//! wait for.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
    max_permits: usize,
}

impl SessionLockMap {
    /// `max_permits` is how many runs may be in flight per session at
    /// once. Pass 1 for the default "one run per session" policy, or
    /// `Semaphore::MAX_PERMITS` when `run.allow_concurrent_runs_per_session`
    /// is set.
    pub fn new(max_permits: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            max_permits,
        }
    }

    /// Attempt to acquire a run permit for a session without waiting.
    /// Returns `Err(SessionBusy)` immediately if the session has no
    /// permits left.
    pub fn try_acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_key.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_permits)))
                .clone()
        };
        sem.try_acquire_owned().map_err(|_| SessionBusy)
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Remove locks for sessions with no run currently holding a permit.
    /// Safe to call periodically; a session with any in-flight run is
    /// never pruned because its semaphore has fewer available permits
    /// than it was constructed with.
    pub fn prune_idle(&self) {
        let max_permits = self.max_permits;
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() < max_permits);
    }
}

/// Error returned when a session has no run permits left.
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy — a run is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_access_succeeds() {
        let map = SessionLockMap::new(1);
        let permit1 = map.try_acquire("s1").unwrap();
        drop(permit1);
        let permit2 = map.try_acquire("s1").unwrap();
        drop(permit2);
    }

    #[test]
    fn different_sessions_concurrent() {
        let map = SessionLockMap::new(1);
        let p1 = map.try_acquire("s1").unwrap();
        let p2 = map.try_acquire("s2").unwrap();
        assert_eq!(map.session_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[test]
    fn concurrent_acquire_same_session_is_rejected_by_default() {
        let map = SessionLockMap::new(1);
        let _p1 = map.try_acquire("s1").unwrap();
        assert!(map.try_acquire("s1").is_err());
    }

    #[test]
    fn concurrent_acquire_same_session_allowed_with_higher_permit_count() {
        let map = SessionLockMap::new(2);
        let _p1 = map.try_acquire("s1").unwrap();
        let _p2 = map.try_acquire("s1").unwrap();
        assert!(map.try_acquire("s1").is_err());
    }

    #[test]
    fn prune_idle_removes_unheld_locks() {
        let map = SessionLockMap::new(1);
        {
            let _p = map.try_acquire("s1").unwrap();
        }
        map.try_acquire("s2").unwrap();
        map.prune_idle();
        assert_eq!(map.session_count(), 1);
    }
}
