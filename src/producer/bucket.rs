//! Bounded FIFO smoothing bursts ahead of the vendor

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity queue. Adding never blocks: at capacity the item is
/// handed back to the caller.
#[derive(Debug)]
pub struct Bucket<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> Bucket<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `item`, or return it when the bucket is full
    pub fn add(&self, item: T) -> Result<(), T> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        Ok(())
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove up to `n` items from the front
    pub fn popn(&self, n: usize) -> Vec<T> {
        let mut items = self.lock();
        let n = n.min(items.len());
        items.drain(..n).collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Empty the bucket, returning everything that was queued
    pub fn truncate(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }
}
