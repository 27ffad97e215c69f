//! Response cache with frequency-aware expiry
//!
//! Provides a `ResponseCache` that keeps API payloads in memory, writes the
//! whole store through to a `KeyValueStore` after every mutation, and expires
//! entries according to the sampling frequency of their series.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::key::CacheKey;
use super::store::KeyValueStore;
use crate::data::frequency::{ttl_for, Frequency};

/// Persistence key the whole store is written under
pub const STORE_KEY: &str = "response_cache";

/// A cached API payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached payload
    pub data: Value,
    /// When the payload was stored
    pub stored_at: DateTime<Utc>,
    /// Frequency of the series, decides the entry's lifetime
    pub frequency: Option<Frequency>,
}

impl CacheEntry {
    /// Whether the entry has outlived its TTL at `now`
    ///
    /// An entry exactly `ttl` old is still fresh.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > ttl_for(self.frequency)
    }
}

/// Aggregate numbers for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    /// Size of the serialized store in bytes
    pub size_bytes: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Outcome of a non-evicting cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(CacheEntry),
    Expired(CacheEntry),
    Missing,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    key: &'a CacheKey,
    entry: &'a CacheEntry,
}

#[derive(Deserialize)]
struct Record {
    key: CacheKey,
    entry: CacheEntry,
}

type Entries = HashMap<CacheKey, CacheEntry>;

/// Keyed store of API responses backed by a durable key-value store
///
/// Every mutation is flushed to the backing store while the lock is held, so
/// memory and the durable copy never drift apart by more than one operation.
/// Backing store failures are logged and otherwise ignored: the cache keeps
/// working from memory for the rest of the process.
pub struct ResponseCache {
    entries: Mutex<Entries>,
    store: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Creates a cache over `store` using the system clock, loading any persisted state
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a cache with an explicit clock
    pub fn with_clock(store: impl KeyValueStore + 'static, clock: Arc<dyn Clock>) -> Self {
        let store: Box<dyn KeyValueStore> = Box::new(store);
        let entries = load_entries(store.as_ref());
        Self {
            entries: Mutex::new(entries),
            store,
            clock,
        }
    }

    /// Derives the key for a query
    pub fn key(
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Option<Frequency>,
    ) -> CacheKey {
        CacheKey::new(series, start, end, frequency)
    }

    /// Returns the cached payload if present and fresh
    ///
    /// An expired entry is evicted and the eviction persisted.
    pub fn get(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Option<Frequency>,
    ) -> Option<Value> {
        let key = Self::key(series, start, end, frequency);
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = entries.get(&key)?.is_expired_at(now);
        if expired {
            entries.remove(&key);
            self.persist(&entries);
            debug!(key = %key, "cache entry expired, evicted");
            return None;
        }

        debug!(key = %key, "cache hit");
        entries.get(&key).map(|entry| entry.data.clone())
    }

    /// Classifies the entry for a key without evicting anything
    ///
    /// The fetch client uses this so an expired entry is still around to
    /// serve if the network fails.
    pub fn lookup(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Option<Frequency>,
    ) -> Lookup {
        let key = Self::key(series, start, end, frequency);
        let now = self.clock.now();
        match self.lock().get(&key) {
            Some(entry) if entry.is_expired_at(now) => Lookup::Expired(entry.clone()),
            Some(entry) => Lookup::Fresh(entry.clone()),
            None => Lookup::Missing,
        }
    }

    /// Stores `data`, replacing any entry under the same key
    pub fn set(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        data: Value,
        frequency: Option<Frequency>,
    ) {
        self.insert(Self::key(series, start, end, frequency), data, frequency);
    }

    /// Stores `data` under an explicit key, with `frequency` deciding its TTL
    ///
    /// Used when the frequency learned from a response differs from the one
    /// the key was derived with.
    pub fn insert(&self, key: CacheKey, data: Value, frequency: Option<Frequency>) {
        let entry = CacheEntry {
            data,
            stored_at: self.clock.now(),
            frequency,
        };
        let mut entries = self.lock();
        debug!(key = %key, "caching response");
        entries.insert(key, entry);
        self.persist(&entries);
    }

    /// Returns the entry for a key whether or not it has expired, without evicting
    pub fn peek_stale(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Option<Frequency>,
    ) -> Option<CacheEntry> {
        let key = Self::key(series, start, end, frequency);
        self.lock().get(&key).cloned()
    }

    /// Removes every entry, in memory and in the backing store
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        if let Err(e) = self.store.remove(STORE_KEY) {
            warn!(error = %e, "failed to remove persisted cache");
        }
        info!("cache cleared");
    }

    /// Computes statistics without modifying the store
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.lock();

        let expired = entries.values().filter(|e| e.is_expired_at(now)).count();
        let size_bytes = serialize_entries(&entries)
            .map(|s| s.len())
            .unwrap_or(0);

        CacheStats {
            total: entries.len(),
            valid: entries.len() - expired,
            expired,
            size_bytes,
            oldest: entries.values().map(|e| e.stored_at).min(),
            newest: entries.values().map(|e| e.stored_at).max(),
        }
    }

    /// Evicts all expired entries and returns how many were removed
    ///
    /// Persists once at the end, and only if something was evicted.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries);
            info!(removed, "cleaned up expired cache entries");
        }
        removed
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A panic mid-operation leaves the map structurally intact, keep using it
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &Entries) {
        let serialized = match serialize_entries(entries) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache");
                return;
            }
        };
        if let Err(e) = self.store.set(STORE_KEY, &serialized) {
            warn!(error = %e, "failed to persist cache, continuing in memory");
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .finish()
    }
}

fn serialize_entries(entries: &Entries) -> serde_json::Result<String> {
    let records: Vec<RecordRef<'_>> = entries
        .iter()
        .map(|(key, entry)| RecordRef { key, entry })
        .collect();
    serde_json::to_string(&records)
}

/// Reads the persisted store, falling back to empty on any problem
fn load_entries(store: &dyn KeyValueStore) -> Entries {
    let content = match store.get(STORE_KEY) {
        Ok(Some(content)) => content,
        Ok(None) => return Entries::new(),
        Err(e) => {
            warn!(error = %e, "failed to read persisted cache, starting empty");
            return Entries::new();
        }
    };

    match serde_json::from_str::<Vec<Record>>(&content) {
        Ok(records) => {
            let entries: Entries = records.into_iter().map(|r| (r.key, r.entry)).collect();
            debug!(count = entries.len(), "loaded persisted cache");
            entries
        }
        Err(e) => {
            warn!(error = %e, "persisted cache is corrupt, starting empty");
            Entries::new()
        }
    }
}
