// Bounded in-memory history buffers
//
// Each stream keeps the last N records in arrival order. Once capacity is
// reached the oldest record is evicted on every push (ring buffer behavior).
// `BoundedHistory` carries no locking of its own; `SharedHistory` wraps it in
// a reader/writer lock so REST readers see consistent snapshots while the
// single producer appends.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::VecDeque;
use std::sync::Arc;

/// Fixed-capacity, oldest-evicted-first store of a single record type
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, evicting from the front while over capacity
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Most recently pushed item
    pub fn latest(&self) -> Option<T> {
        self.items.back().cloned()
    }

    /// Up to `limit` most recent items, oldest to newest.
    /// The whole buffer when `limit` is `None`.
    pub fn slice(&self, limit: Option<usize>) -> Vec<T> {
        let take = limit.unwrap_or(self.items.len()).min(self.items.len());
        self.items
            .iter()
            .skip(self.items.len() - take)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clone-able handle to a lock-guarded [`BoundedHistory`]
#[derive(Debug)]
pub struct SharedHistory<T> {
    inner: Arc<RwLock<BoundedHistory<T>>>,
}

impl<T> Clone for SharedHistory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> SharedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BoundedHistory::new(capacity))),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BoundedHistory<T>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, BoundedHistory<T>> {
        self.inner.write()
    }

    pub fn latest(&self) -> Option<T> {
        self.inner.read().latest()
    }

    pub fn slice(&self, limit: Option<usize>) -> Vec<T> {
        self.inner.read().slice(limit)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
