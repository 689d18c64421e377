//! Time-boxed memoization of computed metrics.
//!
//! Entries expire lazily: an expired entry is dropped the next time it is
//! read (or on [`ResultCache::cleanup_expired`]). An optional capacity bound
//! evicts expired entries first, then the least recently used one.
//!
//! The whole map sits behind one mutex, so readers only ever see complete
//! values. [`ResultCache::get_or_try_insert_with`] additionally serialises
//! computation per key: concurrent callers for the same key run the
//! computation once and share its result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default time-to-live for cached results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    last_used: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key/value cache with per-entry expiry.
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    default_ttl: Duration,
    /// 0 = unbounded
    capacity: usize,
}

impl<V: Clone> ResultCache<V> {
    /// Unbounded cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(default_ttl, 0)
    }

    /// Cache holding at most `capacity` entries (0 = unbounded).
    pub fn with_capacity(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            default_ttl,
            capacity,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fetch a live entry. Expired entries are removed and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.last_used = now;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Store `value` with the default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value`, expiring `ttl` from now.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = lock(&self.entries);

        if self.capacity > 0 && !entries.contains_key(key) && entries.len() >= self.capacity {
            evict(&mut entries, self.capacity, now);
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                last_used: now,
            },
        );
    }

    /// Remove one entry.
    pub fn delete(&self, key: &str) {
        lock(&self.entries).remove(key);
    }

    /// Remove everything.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired cache entries");
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Only one caller computes a given key at a time; others block and then
    /// read the stored result. Errors are returned to the computing caller
    /// and are not cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let key_lock = lock(&self.in_flight)
            .entry(key.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock(&key_lock);

            // Another caller may have filled the entry while we waited.
            match self.get(key) {
                Some(value) => Ok(value),
                None => compute().map(|value| {
                    self.set(key, value.clone());
                    value
                }),
            }
        };

        // Clones are only taken and released under this lock, so whoever
        // leaves the map's handle as its sole owner is the last one out.
        let mut in_flight = lock(&self.in_flight);
        drop(key_lock);
        if in_flight
            .get(key)
            .is_some_and(|handle| Arc::strong_count(handle) == 1)
        {
            in_flight.remove(key);
        }

        result
    }
}

fn evict<V>(entries: &mut HashMap<String, CacheEntry<V>>, capacity: usize, now: Instant) {
    entries.retain(|_, entry| !entry.is_expired(now));

    while entries.len() >= capacity {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                entries.remove(&key);
            }
            None => break,
        }
    }
}

// Entries are only ever replaced whole, so a poisoned lock holds no torn value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
