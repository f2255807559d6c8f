//! Process-wide keyed store of individually lockable values.
//!
//! The [`Cacher`] is the one structure touched by concurrently executing
//! calls for cross-call object reuse. Locking is two-level: a registry lock
//! guards structural map mutation (insert/lookup/delete) while each entry
//! carries its own lock guarding exclusive use of its value. Unrelated keys
//! are fully concurrent; exclusive use of a single value is serialized.
//!
//! `checkout(key, wait: false)` contention is a normal, recoverable condition
//! surfaced as [`LockContention`](crate::PlugwireError::LockContention) so the
//! caller chooses retry vs. fail-fast; it is never auto-retried here.
//!
//! # Example
//!
//! ```
//! use plugwire::cacher::Cacher;
//!
//! let cache: Cacher<String> = Cacher::new();
//! cache.insert("guest+unix:/run/g.sock", "proxy".to_string());
//!
//! let value = cache.checkout("guest+unix:/run/g.sock", false).unwrap();
//! assert_eq!(value, "proxy");
//! cache.checkin("guest+unix:/run/g.sock");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{PlugwireError, Result};

/// A cached value paired with its own lock.
///
/// Obtained from [`Cacher::get`] without acquiring the lock; exclusive use
/// goes through the owning cacher.
pub struct CacheEntry<V> {
    value: V,
    held: Mutex<bool>,
    released: Condvar,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            held: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// The cached value. Does not acquire the entry lock.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Whether the entry lock is currently held.
    pub fn locked(&self) -> bool {
        *self.held.lock()
    }

    fn acquire(&self, wait: bool, key: &str) -> Result<()> {
        let mut held = self.held.lock();
        if *held {
            if !wait {
                return Err(PlugwireError::LockContention(key.to_string()));
            }
            while *held {
                self.released.wait(&mut held);
            }
        }
        *held = true;
        Ok(())
    }

    fn release(&self) {
        let mut held = self.held.lock();
        *held = false;
        self.released.notify_one();
    }
}

/// Releases an entry lock on every exit path, including panics.
struct HeldGuard<'a, V> {
    entry: &'a CacheEntry<V>,
}

impl<V> Drop for HeldGuard<'_, V> {
    fn drop(&mut self) {
        self.entry.release();
    }
}

/// Gate other callers wait on while one caller builds a value for a key.
struct BuildGate {
    done: Mutex<bool>,
    finished: Condvar,
}

impl BuildGate {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            finished: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.finished.wait(&mut done);
        }
    }

    fn finish(&self) {
        *self.done.lock() = true;
        self.finished.notify_all();
    }
}

/// Removes the pending gate and wakes waiters on every exit path, including
/// a panicking builder.
struct PendingGuard<'a, V> {
    cacher: &'a Cacher<V>,
    key: &'a str,
    gate: Arc<BuildGate>,
}

impl<V> Drop for PendingGuard<'_, V> {
    fn drop(&mut self) {
        self.cacher.pending.lock().remove(self.key);
        self.gate.finish();
    }
}

/// Process-wide keyed store of lazily-built, individually lockable values.
///
/// Entries live for the process lifetime unless explicitly deleted; there is
/// no implicit eviction.
pub struct Cacher<V> {
    entries: Mutex<HashMap<String, Arc<CacheEntry<V>>>>,
    pending: Mutex<HashMap<String, Arc<BuildGate>>>,
}

impl<V: Clone> Cacher<V> {
    /// Create an empty cacher.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a value is registered under `key`.
    pub fn registered(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Install a value under `key`, replacing any prior entry.
    ///
    /// The new entry gets its own fresh lock.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries
            .lock()
            .insert(key.into(), Arc::new(CacheEntry::new(value)));
    }

    /// The entry wrapper for `key`, without acquiring its lock.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.entries.lock().get(key).cloned()
    }

    /// Get the value for `key`, building and installing it first if absent.
    ///
    /// Concurrent callers for the same key share a single build; the value
    /// becomes visible only after construction completes. The registry lock is
    /// not held while the builder runs, so operations on other keys stay fully
    /// concurrent and a builder may itself use this cacher for other keys. A
    /// failed build installs nothing and the next caller retries; a builder
    /// that calls back in for its own key deadlocks.
    pub fn get_or_create<F>(&self, key: &str, build: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let gate = loop {
            if let Some(entry) = self.entries.lock().get(key) {
                return Ok(entry.value.clone());
            }
            let in_flight = {
                let mut pending = self.pending.lock();
                match pending.get(key) {
                    Some(gate) => gate.clone(),
                    None => {
                        let gate = Arc::new(BuildGate::new());
                        pending.insert(key.to_string(), gate.clone());
                        break gate;
                    }
                }
            };
            in_flight.wait();
        };

        let _cleanup = PendingGuard {
            cacher: self,
            key,
            gate,
        };
        let value = build()?;
        self.entries
            .lock()
            .insert(key.to_string(), Arc::new(CacheEntry::new(value.clone())));
        Ok(value)
    }

    /// Run `f` with the entry's lock held for the duration of the call.
    ///
    /// The lock is released on every exit path, including panics. Blocks if
    /// another caller holds the lock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `key` is not registered.
    pub fn with<R, F>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&V) -> R,
    {
        let entry = self.require(key)?;
        entry.acquire(true, key)?;
        let _guard = HeldGuard { entry: &entry };
        Ok(f(&entry.value))
    }

    /// Acquire the entry's lock and return its value without releasing.
    ///
    /// With `wait` false the call fails immediately with `LockContention` when
    /// the lock is already held; with `wait` true it blocks the calling thread
    /// until the holder calls [`Cacher::checkin`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `key` is not registered, `LockContention` on a
    /// non-waiting checkout of a held entry.
    pub fn checkout(&self, key: &str, wait: bool) -> Result<V> {
        let entry = self.require(key)?;
        entry.acquire(wait, key)?;
        Ok(entry.value.clone())
    }

    /// Release a previously acquired entry lock. No-op if `key` is absent.
    pub fn checkin(&self, key: &str) {
        if let Some(entry) = self.get(key) {
            entry.release();
        }
    }

    /// Remove the entry for `key`, returning its value.
    ///
    /// The entry's lock is acquired (waiting for any in-flight checkout) and
    /// released before removal, so deletion cannot race exclusive use.
    pub fn delete(&self, key: &str) -> Option<V> {
        let entry = self.get(key)?;
        // Wait out any holder before removing. Acquire can only fail on a
        // non-waiting checkout, so the expression below always succeeds.
        if entry.acquire(true, key).is_ok() {
            entry.release();
        }
        let mut entries = self.entries.lock();
        match entries.get(key) {
            // Only remove the entry we drained; a concurrent replacement
            // under the same key stays.
            Some(current) if Arc::ptr_eq(current, &entry) => entries
                .remove(key)
                .map(|removed| removed.value.clone()),
            _ => None,
        }
    }

    fn require(&self, key: &str) -> Result<Arc<CacheEntry<V>>> {
        self.get(key)
            .ok_or_else(|| PlugwireError::NotFound(format!("cache entry `{key}'")))
    }
}

impl<V: Clone> Default for Cacher<V> {
    fn default() -> Self {
        Self::new()
    }
}
