//! Named entity locks.
//!
//! Every operation that mutates shared stock or an order row takes a named
//! lock keyed `{type}:{id}` for the duration of the mutation batch. Multiple
//! keys are deduplicated and acquired in sorted order, so two operations that
//! need overlapping key sets (say, concurrent single-line cancellations of
//! the same order) can never deadlock against each other.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// Lock provider contract. Guards release on every exit path, including
/// panics, because release lives in `Drop`.
pub trait EntityLock: Send + Sync {
    /// Acquire the named locks (deduplicated, sorted) until the guard drops.
    fn acquire(&self, keys: &[String]) -> LockGuard;
}

/// Lock key for an order row.
pub fn order_key(id: impl core::fmt::Display) -> String {
    format!("order:{id}")
}

/// Lock key for a SKU's stock.
pub fn sku_key(id: impl core::fmt::Display) -> String {
    format!("sku:{id}")
}

#[derive(Default)]
struct KeyLock {
    busy: Mutex<bool>,
    released: Condvar,
}

impl KeyLock {
    fn lock(&self) {
        let mut busy = self.busy.lock().expect("key lock poisoned");
        while *busy {
            busy = self.released.wait(busy).expect("key lock poisoned");
        }
        *busy = true;
    }

    fn unlock(&self) {
        let mut busy = self.busy.lock().expect("key lock poisoned");
        *busy = false;
        self.released.notify_one();
    }
}

/// Holds a set of named locks; releases them (in reverse order) on drop.
pub struct LockGuard {
    held: Vec<Arc<KeyLock>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        for lock in self.held.iter().rev() {
            lock.unlock();
        }
    }
}

/// In-process lock registry.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<KeyLock> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks.entry(key.to_string()).or_default().clone()
    }
}

impl EntityLock for LockRegistry {
    fn acquire(&self, keys: &[String]) -> LockGuard {
        let mut ordered: Vec<&String> = keys.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut held = Vec::with_capacity(ordered.len());
        for key in ordered {
            let lock = self.entry(key);
            lock.lock();
            held.push(lock);
        }
        LockGuard { held }
    }
}
