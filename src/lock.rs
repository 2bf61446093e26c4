//! Poison-recovering lock guards.
//!
//! A panic on a task holding one of these locks poisons it. Everything
//! guarded in this crate (cache entries, loader state, collection items,
//! confirmation sequences) stays structurally valid mid-update, so the
//! guards recover the inner value and log the event instead of propagating
//! the poison to every later caller.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(
    result: Result<G, PoisonError<G>>,
    guard: &'static str,
    source: &'static str,
    op: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            guard,
            source,
            op,
            "Lock poisoned by a panicked task, continuing with recovered state"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), "rwlock.read", source, op)
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), "rwlock.write", source, op)
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), "mutex", source, op)
}
