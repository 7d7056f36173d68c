//! Per-session in-process mutual exclusion.
//!
//! Every write to a session is serialized through one exclusive guard keyed
//! by `SessionId`, so two concurrent requests against the same session
//! never interleave their read-modify-write of the session record. This is
//! independent of the domain-level `SessionLock`/`UserAccessGrant` records
//! in `model` — those are business locks a user can see and release; this
//! is the engine's own critical-section guard and is invisible to callers.
//!
//! Modeled on a `distributed_lock`-style acquire/release pair, scoped down
//! to a single process with `dashmap` + `tokio::sync::Mutex` since the
//! engine has no multi-node deployment to coordinate across.

use crate::ids::SessionId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum SessionLockError {
    #[error("session {session_id} busy, exceeded {deadline_ms}ms wait")]
    Timeout { session_id: SessionId, deadline_ms: u64 },
}

/// Holds an exclusive guard for one session for as long as it's alive.
/// Dropping it releases the slot; the registry reaps unreferenced entries
/// lazily on the next `acquire` for that session.
pub struct SessionGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct SessionLockRegistry {
    slots: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive slot for `session_id`, waiting up to
    /// `deadline` before giving up with `SessionLockError::Timeout`.
    pub async fn acquire(
        &self,
        session_id: SessionId,
        deadline: Duration,
    ) -> Result<SessionGuard, SessionLockError> {
        let slot = self
            .slots
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = tokio::time::timeout(deadline, slot.lock_owned())
            .await
            .map_err(|_| SessionLockError::Timeout {
                session_id,
                deadline_ms: deadline.as_millis() as u64,
            })?;

        self.gc(session_id, &slot);
        Ok(SessionGuard { _guard: guard })
    }

    /// Drops the map entry if nothing else references the slot. Called
    /// opportunistically on acquire rather than via a background sweep —
    /// the registry only ever grows by the number of sessions concurrently
    /// contended, which is small.
    fn gc(&self, session_id: SessionId, slot: &Arc<Mutex<()>>) {
        // strong_count: registry's own clone (slot) + the DashMap entry + this temp == at least 2.
        // 1 more than `slot` is held while the Entry borrow below momentarily bumps it, so
        // only remove when genuinely unreferenced elsewhere.
        if Arc::strong_count(slot) <= 2 {
            self.slots.remove_if(&session_id, |_, v| Arc::strong_count(v) <= 2);
        }
    }
}

#[allow(dead_code)]
fn _assert_send_sync<T: Send + Sync>() {}
#[allow(dead_code)]
fn _assertions() {
    _assert_send_sync::<SessionLockRegistry>();
}
