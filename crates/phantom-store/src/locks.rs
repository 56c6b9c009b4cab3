//! Row lock table for the in-memory backend.
//!
//! Each row key has at most one owning unit. A unit that finds its key taken
//! records what it waits for and sleeps on a shared condition variable until
//! some unit releases locks or its own lock timeout runs out.
//!
//! Before sleeping, the waiter walks the wait-for chain starting at the
//! current owner. If the chain leads back to the waiter, sleeping would never
//! end, so the request fails with `StoreError::Deadlock` instead.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use phantom_core::EntityKey;

use crate::error::{Result, StoreError};

/// Identifies the unit of work owning or waiting for locks.
pub type UnitId = u64;

#[derive(Debug, Default)]
struct LockState {
    owners: HashMap<EntityKey, UnitId>,
    waiting: HashMap<UnitId, EntityKey>,
}

impl LockState {
    /// Whether `unit` waiting on a row owned by `owner` closes a cycle.
    fn closes_cycle(&self, unit: UnitId, mut owner: UnitId) -> bool {
        // Each hop follows a distinct waiter, so the chain is bounded.
        for _ in 0..=self.waiting.len() {
            if owner == unit {
                return true;
            }
            let Some(key) = self.waiting.get(&owner) else {
                return false;
            };
            let Some(&next) = self.owners.get(key) else {
                return false;
            };
            owner = next;
        }
        false
    }
}

/// Exclusive row locks with timeouts and deadlock detection.
#[derive(Debug, Default)]
pub struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockTable {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock on `key` for `unit`, waiting at most `timeout`.
    ///
    /// Re-acquiring a lock the unit already owns succeeds immediately.
    ///
    /// # Errors
    ///
    /// - `StoreError::Deadlock` if waiting would close a cycle.
    /// - `StoreError::LockTimeout` if the lock is still taken after `timeout`.
    pub fn acquire(&self, key: EntityKey, unit: UnitId, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        loop {
            let owner = match state.owners.get(&key) {
                None => {
                    state.owners.insert(key, unit);
                    state.waiting.remove(&unit);
                    return Ok(());
                }
                Some(&owner) if owner == unit => {
                    state.waiting.remove(&unit);
                    return Ok(());
                }
                Some(&owner) => owner,
            };

            if state.closes_cycle(unit, owner) {
                state.waiting.remove(&unit);
                tracing::debug!(%key, unit, owner, "Lock wait would deadlock");
                return Err(StoreError::Deadlock { key });
            }

            state.waiting.insert(unit, key);
            let timed_out = match deadline {
                Some(at) => self.released.wait_until(&mut state, at).timed_out(),
                None => {
                    self.released.wait(&mut state);
                    false
                }
            };

            if timed_out && state.owners.get(&key).is_some_and(|&o| o != unit) {
                state.waiting.remove(&unit);
                tracing::debug!(%key, unit, "Lock wait timed out");
                return Err(StoreError::LockTimeout { key });
            }
        }
    }

    /// Release one lock if `unit` owns it.
    pub fn release(&self, key: EntityKey, unit: UnitId) {
        let mut state = self.state.lock();
        if state.owners.get(&key) == Some(&unit) {
            state.owners.remove(&key);
        }
        drop(state);
        self.released.notify_all();
    }

    /// Release every listed lock owned by `unit` and forget its wait.
    pub fn release_all<I>(&self, unit: UnitId, keys: I)
    where
        I: IntoIterator<Item = EntityKey>,
    {
        let mut state = self.state.lock();
        for key in keys {
            if state.owners.get(&key) == Some(&unit) {
                state.owners.remove(&key);
            }
        }
        state.waiting.remove(&unit);
        drop(state);
        self.released.notify_all();
    }

    /// The unit currently owning `key`, if any.
    #[must_use]
    pub fn owner(&self, key: EntityKey) -> Option<UnitId> {
        self.state.lock().owners.get(&key).copied()
    }

    /// The row `unit` is currently waiting for, if any.
    #[must_use]
    pub fn waiting_for(&self, unit: UnitId) -> Option<EntityKey> {
        self.state.lock().waiting.get(&unit).copied()
    }

    /// Number of rows currently locked.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.state.lock().owners.len()
    }
}
