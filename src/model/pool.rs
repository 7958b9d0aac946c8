//! Bounded free list for reusable work units

use std::sync::{Mutex, PoisonError};

/// A value that can be cleared for reuse
pub trait Poolable: Default + Send {
    /// Restore the value to its freshly constructed state
    fn reset(&mut self);
}

/// Keeps at most `capacity` idle values; anything beyond is dropped
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    pub fn acquire(&self) -> T {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    /// Reset `value` and keep it for the next `acquire`
    pub fn release(&self, mut value: T) {
        value.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.capacity {
            idle.push(value);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
