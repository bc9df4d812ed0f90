//! Keyed async mutual exclusion.
//!
//! One lazily created async mutex per key. Entries are dropped from the
//! table once no holder or waiter references them, so the table only grows
//! with the number of keys in flight.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Table of per-key locks.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(key.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Keys currently held or waited on.
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, key: &K) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            table.remove(key);
        }
    }
}

/// Holds the lock for one key until dropped.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyedGuard<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        // Release the mutex before checking whether anyone else still needs it.
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}
