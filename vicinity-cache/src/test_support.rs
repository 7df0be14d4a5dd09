//! Shared-store doubles for exercising cache degradation.
#![forbid(unsafe_code)]

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use vicinity_core::CacheKind;

use crate::{MemorySharedStore, SharedStore, SharedStoreError};

/// Shared store that can be taken offline and counts the calls it receives.
#[derive(Debug)]
pub struct FlakySharedStore {
    inner: MemorySharedStore,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl Default for FlakySharedStore {
    fn default() -> Self {
        Self {
            inner: MemorySharedStore::new(1_024),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FlakySharedStore {
    /// Store that fails every call.
    #[must_use]
    pub fn offline() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    /// Simulate an outage or recovery.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SharedStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SharedStoreError::Unavailable {
                message: String::from("simulated outage"),
            });
        }
        Ok(())
    }
}

impl SharedStore for FlakySharedStore {
    fn kind(&self) -> CacheKind {
        CacheKind::Shared
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedStoreError> {
        self.check()?;
        self.inner.set(key, value, ttl)
    }

    fn ping(&self) -> Result<(), SharedStoreError> {
        self.check()
    }

    fn key_count(&self) -> Result<u64, SharedStoreError> {
        self.check()?;
        self.inner.key_count()
    }
}
