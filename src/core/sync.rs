//! Synchronization utilities for robust lock handling
//!
//! The snapshot cache, the producer bucket and the consumer bookkeeping all
//! sit behind `std::sync` locks. A panic while one of them is held poisons
//! the lock; these helpers turn that into the owning subsystem's error type
//! instead of propagating the panic into every later caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

fn poisoned<E>(lock: &str, error_constructor: impl FnOnce(String) -> E) -> E {
    error_constructor(format!(
        "{} poisoned: a thread panicked while holding it",
        lock
    ))
}

/// Map a poisoned `Mutex::lock()` into the caller's error type
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use queuehook::core::sync::handle_mutex_poison;
/// use queuehook::producer::api::ProducerError;
///
/// let inflight = Mutex::new(42);
/// let guard = handle_mutex_poison(inflight.lock(), |message| ProducerError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<'a, T, E>(
    result: LockResult<MutexGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    result.map_err(|_| poisoned("mutex", error_constructor))
}

/// Map a poisoned `RwLock::read()` into the caller's error type
pub fn handle_rwlock_read<'a, T, E>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    result.map_err(|_| poisoned("rwlock (read)", error_constructor))
}

/// Map a poisoned `RwLock::write()` into the caller's error type
pub fn handle_rwlock_write<'a, T, E>(
    result: LockResult<RwLockWriteGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    result.map_err(|_| poisoned("rwlock (write)", error_constructor))
}

/// Counts one unit of in-flight work for as long as it lives
///
/// Managers expose their idle state by reading the shared counter; the
/// guard keeps increments and decrements paired on every exit path,
/// including panics unwinding through the owning future.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    pub fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
