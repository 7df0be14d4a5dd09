//! Bounded in-process map with FIFO-by-write eviction.
#![forbid(unsafe_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

/// A cached value with its write time.
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// Shared payload; hits only bump the reference count.
    pub data: Arc<T>,
    /// When the entry was written.
    pub written_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Wrap `data` stamped with the current time.
    #[must_use]
    pub fn new(data: Arc<T>) -> Self {
        Self {
            data,
            written_at: Instant::now(),
        }
    }

    /// Whether the entry is still valid: `now - written_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.written_at.elapsed() < ttl
    }
}

struct Slot<T> {
    entry: CacheEntry<T>,
    sequence: u64,
}

struct Inner<T> {
    entries: HashMap<String, Slot<T>>,
    // Write order; records whose sequence no longer matches the live slot are
    // stale and skipped.
    order: VecDeque<(u64, String)>,
    next_sequence: u64,
}

/// L1 map for one cache kind.
pub(crate) struct BoundedMap<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    ttl: Duration,
}

impl<T> BoundedMap<T> {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_sequence: 0,
            }),
            capacity,
            ttl,
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Fresh value for `key`; expired entries are dropped on read.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        let mut inner = self.lock();
        let fresh = inner
            .entries
            .get(key)
            .map(|slot| slot.entry.is_fresh(self.ttl))?;
        if fresh {
            return inner.entries.get(key).map(|slot| Arc::clone(&slot.entry.data));
        }
        inner.entries.remove(key);
        None
    }

    /// Write `value`, evicting the oldest writes once over capacity.
    pub(crate) fn insert(&self, key: &str, value: Arc<T>) {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence = sequence.wrapping_add(1);
        inner.entries.insert(
            key.to_owned(),
            Slot {
                entry: CacheEntry::new(value),
                sequence,
            },
        );
        inner.order.push_back((sequence, key.to_owned()));
        while inner.entries.len() > self.capacity {
            let Some((oldest, oldest_key)) = inner.order.pop_front() else {
                break;
            };
            let live = inner
                .entries
                .get(&oldest_key)
                .is_some_and(|slot| slot.sequence == oldest);
            if live {
                inner.entries.remove(&oldest_key);
            }
        }
        if inner.order.len() > self.capacity.saturating_mul(2).saturating_add(16) {
            let Inner { entries, order, .. } = &mut *inner;
            order.retain(|(seq, k)| entries.get(k).is_some_and(|slot| slot.sequence == *seq));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
